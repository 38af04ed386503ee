//! Core data models used throughout the sync engine.
//!
//! These types are read-only snapshots of workspace state fetched during a
//! run, plus the dictionary senses used to enrich new entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Strip separator characters so ids compare and format canonically.
///
/// The workspace hands out ids both as `7650f744-6586-4a78-...` and as the
/// dashless 32-character form; links and equality checks use the latter.
pub fn normalize_id(id: &str) -> String {
    id.chars().filter(|c| *c != '-').collect()
}

/// Structural kind of a [`DocumentNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A page: a top-level document that owns the blocks below it.
    Document,
    /// A bulleted (or numbered) list item, the only leaf that can carry a unit.
    ListItem,
    /// Any other block type, kept as its wire name.
    Other(String),
}

impl NodeKind {
    /// Classify a wire block type.
    pub fn from_block_type(block_type: &str) -> Self {
        match block_type {
            "child_page" => NodeKind::Document,
            "bulleted_list_item" | "numbered_list_item" => NodeKind::ListItem,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Document => "document",
            NodeKind::ListItem => "list_item",
            NodeKind::Other(name) => name,
        }
    }
}

/// One run of rich text with the annotations that matter for extraction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRun {
    pub plain_text: String,
    pub bold: bool,
    pub italic: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain_text: text.into(),
            ..Default::default()
        }
    }

    /// A run marked both bold and italic: the unit annotation.
    pub fn annotated(text: impl Into<String>) -> Self {
        Self {
            plain_text: text.into(),
            bold: true,
            italic: true,
        }
    }
}

/// A node of the workspace tree.
#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub id: String,
    pub kind: NodeKind,
    pub has_children: bool,
    /// Nearest enclosing top-level document. Filled in by the walker and only
    /// used to build deep links.
    pub owning_document_id: Option<String>,
    pub last_edited_at: DateTime<Utc>,
    /// Rich text of list items; empty for other kinds.
    pub rich_text: Vec<TextRun>,
}

/// A top-level document acting as a synchronization root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDocument {
    pub id: String,
    pub last_edited_at: DateTime<Utc>,
    /// `None` until the first successful extraction.
    pub last_extracted_at: Option<DateTime<Utc>>,
}

/// A candidate vocabulary item and where it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedUnit {
    pub text: String,
    pub source_document_id: String,
    pub source_block_id: String,
}

/// The two vocabulary collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Word,
    Expression,
}

impl Collection {
    /// Any whitespace makes the unit an expression.
    pub fn for_text(text: &str) -> Self {
        if text.chars().any(char::is_whitespace) {
            Collection::Expression
        } else {
            Collection::Word
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Word => f.write_str("word"),
            Collection::Expression => f.write_str("expression"),
        }
    }
}

/// A database row as returned by a query or a create.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    /// Wire object type (`"page"` for rows; anything else is unexpected).
    pub object: String,
    pub title: Option<String>,
    pub last_edited_at: Option<DateTime<Utc>>,
}

/// Structured predicate for database queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    TitleEquals { property: String, value: String },
    MultiSelectContains { property: String, value: String },
}

/// A property write on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Title(String),
    Date(DateTime<Utc>),
    /// Clears a date property.
    NoDate,
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub results: Vec<T>,
    /// Cursor for the next page; `None` once exhausted.
    pub next_cursor: Option<String>,
}

/// A pronunciation, either half of which may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pronunciation {
    pub phonetic: Option<String>,
    pub audio_url: Option<String>,
}

/// One dictionary sense (homograph) of a headword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sense {
    pub headword: String,
    pub part_of_speech: String,
    pub definitions: Vec<String>,
    pub pronunciations: Vec<Pronunciation>,
}

/// Outcome of a dictionary lookup that reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Vec<Sense>),
    /// The word is unknown; the service may offer spelling suggestions.
    NotFound { suggestions: Vec<String> },
}

/// Result of resolving one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    pub entry_id: String,
    pub collection: Collection,
    /// Whether the entry was created by this resolution.
    pub created: bool,
    /// Whether a new entry was written without dictionary content.
    pub bare: bool,
}
