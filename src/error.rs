//! Error taxonomy for the sync engine.
//!
//! Adapter failures are typed at the boundary ([`WorkspaceError`],
//! [`LookupError`]) and translated into [`SyncError`] by the orchestration
//! layer, which decides fatal versus recoverable with [`SyncError::is_fatal`].

use thiserror::Error;

use crate::models::Collection;

/// Failures reported by a [`Workspace`](crate::traits::Workspace) implementation.
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: API token is invalid")]
    Unauthorized,

    #[error("forbidden: the token does not have access to {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("unexpected HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("page {id} has no '{property}' property")]
    MissingProperty { id: String, property: String },
}

impl WorkspaceError {
    /// Map an HTTP status and response body onto the taxonomy.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => WorkspaceError::BadRequest(body),
            401 => WorkspaceError::Unauthorized,
            403 => WorkspaceError::Forbidden(body),
            404 => WorkspaceError::NotFound(body),
            429 => WorkspaceError::RateLimited,
            _ => WorkspaceError::Status { status, body },
        }
    }

    /// Whether an idempotent read may be attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkspaceError::RateLimited | WorkspaceError::Transport(_) => true,
            WorkspaceError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Failures reported by a [`Lexicon`](crate::traits::Lexicon).
///
/// "Word not found" is not an error; see [`Lookup::NotFound`](crate::models::Lookup).
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("dictionary transport error: {0}")]
    Transport(String),

    #[error("dictionary returned HTTP {0}")]
    Status(u16),

    #[error("unexpected dictionary payload: {0}")]
    Decode(String),

    #[error("dictionary API key not set (env {0})")]
    MissingKey(String),
}

/// Errors surfaced by the walker, tracker and resolver.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{id} is a '{kind}' block; sync roots must be pages")]
    InvalidRootKind { id: String, kind: String },

    #[error("{count} entries titled '{text}' in the {collection} collection; expected at most one")]
    AmbiguousEntry {
        text: String,
        collection: Collection,
        count: usize,
    },

    #[error("{op} failed for {id}: {source}")]
    Workspace {
        op: &'static str,
        id: String,
        #[source]
        source: WorkspaceError,
    },

    #[error("dictionary lookup for '{word}' unavailable: {source}")]
    LookupUnavailable {
        word: String,
        #[source]
        source: LookupError,
    },
}

impl SyncError {
    pub fn workspace(op: &'static str, id: impl Into<String>, source: WorkspaceError) -> Self {
        SyncError::Workspace {
            op,
            id: id.into(),
            source,
        }
    }

    /// Whether the error must abort the run before any sync marker is committed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::LookupUnavailable { .. })
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
