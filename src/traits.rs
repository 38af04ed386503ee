//! Collaborator seams.
//!
//! The sync engine talks to the outside world only through [`Workspace`]
//! and [`Lexicon`]. [`connector_notion`](crate::connector_notion) and
//! [`lexicon`](crate::lexicon) provide the HTTP implementations;
//! [`memory`](crate::memory) provides in-process fakes.
//!
//! ```text
//!  ┌──────────────┐    ┌──────────┐    ┌──────────────┐
//!  │ walker +     │──▶│ resolver │──▶│ sync_state   │
//!  │ sync_state   │    │          │    │ commit       │
//!  └──────┬───────┘    └────┬─────┘    └──────┬───────┘
//!         ▼                 ▼                 ▼
//!     Workspace          Workspace +       Workspace
//!                        Lexicon
//! ```

use async_trait::async_trait;

use crate::blocks::Block;
use crate::error::{LookupError, WorkspaceResult};
use crate::models::{
    ContextDocument, DocumentNode, Filter, Lookup, Paged, PropertyValue, Record,
};

/// The hierarchical workspace hosting contexts and vocabulary databases.
///
/// Listing operations are paginated: callers pass back `next_cursor` until
/// it is `None`. [`all_children`] and [`query_all`] do that loop.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Fetch one block's metadata.
    async fn get_node(&self, id: &str) -> WorkspaceResult<DocumentNode>;

    /// Fetch one page of a block's children.
    async fn get_children(
        &self,
        id: &str,
        cursor: Option<&str>,
    ) -> WorkspaceResult<Paged<DocumentNode>>;

    /// Fetch the sync marker state of a top-level document.
    async fn get_context(&self, id: &str) -> WorkspaceResult<ContextDocument>;

    /// Fetch one page of database rows matching `filter`.
    async fn query(
        &self,
        collection_id: &str,
        filter: &Filter,
        cursor: Option<&str>,
    ) -> WorkspaceResult<Paged<Record>>;

    /// Create a database row with properties and body content.
    async fn create_record(
        &self,
        collection_id: &str,
        fields: &[(String, PropertyValue)],
        content: &[Block],
    ) -> WorkspaceResult<Record>;

    /// Update properties of a row in a single write.
    async fn update_record(
        &self,
        id: &str,
        fields: &[(String, PropertyValue)],
    ) -> WorkspaceResult<Record>;

    /// Append blocks to the end of a page or block.
    async fn append_content(&self, id: &str, content: &[Block]) -> WorkspaceResult<()>;
}

/// An external dictionary.
#[async_trait]
pub trait Lexicon: Send + Sync {
    /// Look a word up. Unknown words are `Ok(Lookup::NotFound { .. })`.
    async fn lookup(&self, word: &str) -> Result<Lookup, LookupError>;
}

/// Drain every page of a block's children.
pub async fn all_children<W: Workspace + ?Sized>(
    workspace: &W,
    id: &str,
) -> WorkspaceResult<Vec<DocumentNode>> {
    let mut children = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = workspace.get_children(id, cursor.as_deref()).await?;
        children.extend(page.results);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(children)
}

/// Drain every page of a database query.
pub async fn query_all<W: Workspace + ?Sized>(
    workspace: &W,
    collection_id: &str,
    filter: &Filter,
) -> WorkspaceResult<Vec<Record>> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = workspace
            .query(collection_id, filter, cursor.as_deref())
            .await?;
        records.extend(page.results);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(records)
}
