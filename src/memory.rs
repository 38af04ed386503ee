//! In-memory [`Workspace`] and [`Lexicon`] for tests and dry experiments.
//!
//! Pages, blocks and database rows live in maps behind a `std::sync::RwLock`.
//! Listings are paginated with a configurable page size so callers exercise
//! their continuation loops. Every write is appended to an operation log
//! that tests use to check ordering.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::blocks::Block;
use crate::error::{LookupError, WorkspaceError, WorkspaceResult};
use crate::models::{
    normalize_id, ContextDocument, DocumentNode, Filter, Lookup, NodeKind, Paged,
    PropertyValue, Record, TextRun,
};
use crate::traits::{Lexicon, Workspace};

/// A write performed against the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Created { collection_id: String, title: String },
    Appended { id: String },
    Updated { id: String },
}

/// A database row, as stored.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub content: Vec<Block>,
}

struct StoredPage {
    last_edited_at: DateTime<Utc>,
    last_extracted_at: Option<DateTime<Utc>>,
    has_marker: bool,
}

#[derive(Default)]
struct State {
    pages: HashMap<String, StoredPage>,
    blocks: HashMap<String, DocumentNode>,
    children: HashMap<String, Vec<String>>,
    /// Database id → rows.
    databases: HashMap<String, Vec<StoredRow>>,
    ops: Vec<WriteOp>,
    failing: HashSet<String>,
    failing_writes: HashSet<String>,
    next_id: u64,
}

pub struct InMemoryWorkspace {
    state: RwLock<State>,
    page_size: usize,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            page_size: 100,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a page, nested under `parent` when given.
    pub fn add_page(
        &self,
        parent: Option<&str>,
        id: &str,
        last_edited_at: DateTime<Utc>,
        last_extracted_at: Option<DateTime<Utc>>,
    ) {
        let id = normalize_id(id);
        let mut state = self.state.write().unwrap();
        state.pages.insert(
            id.clone(),
            StoredPage {
                last_edited_at,
                last_extracted_at,
                has_marker: true,
            },
        );
        state.blocks.insert(
            id.clone(),
            DocumentNode {
                id: id.clone(),
                kind: NodeKind::Document,
                has_children: false,
                owning_document_id: None,
                last_edited_at,
                rich_text: Vec::new(),
            },
        );
        if let Some(parent) = parent {
            state
                .children
                .entry(normalize_id(parent))
                .or_default()
                .push(id);
        }
    }

    /// Add a block of any wire type under `parent`.
    pub fn add_block(&self, parent: &str, id: &str, block_type: &str, rich_text: Vec<TextRun>) {
        let id = normalize_id(id);
        let mut state = self.state.write().unwrap();
        state.blocks.insert(
            id.clone(),
            DocumentNode {
                id: id.clone(),
                kind: NodeKind::from_block_type(block_type),
                has_children: false,
                owning_document_id: None,
                last_edited_at: Utc::now(),
                rich_text,
            },
        );
        state
            .children
            .entry(normalize_id(parent))
            .or_default()
            .push(id);
    }

    pub fn add_list_item(&self, parent: &str, id: &str, rich_text: Vec<TextRun>) {
        self.add_block(parent, id, "bulleted_list_item", rich_text);
    }

    /// Mark a page as edited at `at`.
    pub fn edit_page(&self, id: &str, at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap();
        if let Some(page) = state.pages.get_mut(&normalize_id(id)) {
            page.last_edited_at = at;
        }
    }

    /// Remove the sync marker property from a page.
    pub fn drop_marker(&self, id: &str) {
        let mut state = self.state.write().unwrap();
        if let Some(page) = state.pages.get_mut(&normalize_id(id)) {
            page.has_marker = false;
        }
    }

    /// Create an empty database.
    pub fn add_database(&self, database_id: &str) {
        let mut state = self.state.write().unwrap();
        state.databases.entry(normalize_id(database_id)).or_default();
    }

    /// Add an existing row to a database.
    pub fn add_row(&self, database_id: &str, id: &str, title: &str, tags: &[&str]) {
        let mut state = self.state.write().unwrap();
        state
            .databases
            .entry(normalize_id(database_id))
            .or_default()
            .push(StoredRow {
                id: normalize_id(id),
                title: title.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                content: Vec::new(),
            });
    }

    /// Make every read or write touching `id` fail with a transport error.
    pub fn fail_on(&self, id: &str) {
        self.state.write().unwrap().failing.insert(normalize_id(id));
    }

    /// Make only writes touching `id` fail; reads keep working.
    pub fn fail_writes_on(&self, id: &str) {
        self.state
            .write()
            .unwrap()
            .failing_writes
            .insert(normalize_id(id));
    }

    pub fn rows(&self, database_id: &str) -> Vec<StoredRow> {
        let state = self.state.read().unwrap();
        state
            .databases
            .get(&normalize_id(database_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_extracted(&self, page_id: &str) -> Option<DateTime<Utc>> {
        let state = self.state.read().unwrap();
        state
            .pages
            .get(&normalize_id(page_id))
            .and_then(|p| p.last_extracted_at)
    }

    pub fn ops(&self) -> Vec<WriteOp> {
        self.state.read().unwrap().ops.clone()
    }

    fn check_failing(state: &State, id: &str) -> WorkspaceResult<()> {
        if state.failing.contains(id) {
            return Err(WorkspaceError::Transport(format!("injected failure for {}", id)));
        }
        Ok(())
    }

    fn check_writable(state: &State, id: &str) -> WorkspaceResult<()> {
        Self::check_failing(state, id)?;
        if state.failing_writes.contains(id) {
            return Err(WorkspaceError::Transport(format!("injected write failure for {}", id)));
        }
        Ok(())
    }

    fn paginate<T: Clone>(&self, items: &[T], cursor: Option<&str>) -> WorkspaceResult<Paged<T>> {
        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| WorkspaceError::BadRequest(format!("invalid cursor {}", c)))?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let results = items.get(start..end).map(|s| s.to_vec()).unwrap_or_default();
        let next_cursor = (end < items.len()).then(|| end.to_string());
        Ok(Paged {
            results,
            next_cursor,
        })
    }
}

impl Default for InMemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

fn row_record(row: &StoredRow) -> Record {
    Record {
        id: row.id.clone(),
        object: "page".to_string(),
        title: Some(row.title.clone()),
        last_edited_at: None,
    }
}

fn matches(row: &StoredRow, filter: &Filter) -> bool {
    match filter {
        Filter::TitleEquals { value, .. } => row.title == *value,
        Filter::MultiSelectContains { value, .. } => row.tags.iter().any(|t| t == value),
    }
}

#[async_trait]
impl Workspace for InMemoryWorkspace {
    async fn get_node(&self, id: &str) -> WorkspaceResult<DocumentNode> {
        let id = normalize_id(id);
        let state = self.state.read().unwrap();
        Self::check_failing(&state, &id)?;
        let mut node = state
            .blocks
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        node.has_children = state.children.get(&id).is_some_and(|c| !c.is_empty());
        Ok(node)
    }

    async fn get_children(
        &self,
        id: &str,
        cursor: Option<&str>,
    ) -> WorkspaceResult<Paged<DocumentNode>> {
        let id = normalize_id(id);
        let state = self.state.read().unwrap();
        Self::check_failing(&state, &id)?;
        let children: Vec<DocumentNode> = state
            .children
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|child| {
                        state.blocks.get(child).cloned().map(|mut node| {
                            node.has_children =
                                state.children.get(child).is_some_and(|c| !c.is_empty());
                            node
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.paginate(&children, cursor)
    }

    async fn get_context(&self, id: &str) -> WorkspaceResult<ContextDocument> {
        let id = normalize_id(id);
        let state = self.state.read().unwrap();
        Self::check_failing(&state, &id)?;
        let page = state
            .pages
            .get(&id)
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        if !page.has_marker {
            return Err(WorkspaceError::MissingProperty {
                id,
                property: "last extracted".to_string(),
            });
        }
        Ok(ContextDocument {
            id,
            last_edited_at: page.last_edited_at,
            last_extracted_at: page.last_extracted_at,
        })
    }

    async fn query(
        &self,
        collection_id: &str,
        filter: &Filter,
        cursor: Option<&str>,
    ) -> WorkspaceResult<Paged<Record>> {
        let collection_id = normalize_id(collection_id);
        let state = self.state.read().unwrap();
        Self::check_failing(&state, &collection_id)?;
        let rows = state
            .databases
            .get(&collection_id)
            .ok_or_else(|| WorkspaceError::NotFound(collection_id.clone()))?;
        let records: Vec<Record> = rows
            .iter()
            .filter(|row| matches(row, filter))
            .map(row_record)
            .collect();
        self.paginate(&records, cursor)
    }

    async fn create_record(
        &self,
        collection_id: &str,
        fields: &[(String, PropertyValue)],
        content: &[Block],
    ) -> WorkspaceResult<Record> {
        let collection_id = normalize_id(collection_id);
        let mut state = self.state.write().unwrap();
        Self::check_writable(&state, &collection_id)?;
        if !state.databases.contains_key(&collection_id) {
            return Err(WorkspaceError::NotFound(collection_id));
        }

        let title = fields
            .iter()
            .find_map(|(_, v)| match v {
                PropertyValue::Title(t) => Some(t.clone()),
                _ => None,
            })
            .ok_or_else(|| WorkspaceError::BadRequest("missing title property".into()))?;

        state.next_id += 1;
        let row = StoredRow {
            id: format!("{:032x}", state.next_id),
            title: title.clone(),
            tags: Vec::new(),
            content: content.to_vec(),
        };
        let record = row_record(&row);
        state
            .databases
            .entry(collection_id.clone())
            .or_default()
            .push(row);
        state.ops.push(WriteOp::Created {
            collection_id,
            title,
        });
        Ok(record)
    }

    async fn update_record(
        &self,
        id: &str,
        fields: &[(String, PropertyValue)],
    ) -> WorkspaceResult<Record> {
        let id = normalize_id(id);
        let mut state = self.state.write().unwrap();
        Self::check_writable(&state, &id)?;
        let page = state
            .pages
            .get_mut(&id)
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        for (_, value) in fields {
            match value {
                PropertyValue::Date(at) => page.last_extracted_at = Some(*at),
                PropertyValue::NoDate => page.last_extracted_at = None,
                PropertyValue::Title(_) => {}
            }
        }
        let last_edited_at = Some(page.last_edited_at);
        state.ops.push(WriteOp::Updated { id: id.clone() });
        Ok(Record {
            id,
            object: "page".to_string(),
            title: None,
            last_edited_at,
        })
    }

    async fn append_content(&self, id: &str, content: &[Block]) -> WorkspaceResult<()> {
        let id = normalize_id(id);
        let mut state = self.state.write().unwrap();
        Self::check_writable(&state, &id)?;
        let row = state
            .databases
            .values_mut()
            .flat_map(|rows| rows.iter_mut())
            .find(|row| row.id == id)
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        row.content.extend_from_slice(content);
        state.ops.push(WriteOp::Appended { id });
        Ok(())
    }
}

/// A dictionary answering from a fixed table.
#[derive(Default)]
pub struct StaticLexicon {
    entries: HashMap<String, Lookup>,
    unavailable: bool,
}

impl StaticLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, word: &str, lookup: Lookup) -> Self {
        self.entries.insert(word.to_string(), lookup);
        self
    }

    /// Fail every lookup with a transport error.
    pub fn unavailable() -> Self {
        Self {
            entries: HashMap::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl Lexicon for StaticLexicon {
    async fn lookup(&self, word: &str) -> Result<Lookup, LookupError> {
        if self.unavailable {
            return Err(LookupError::Transport("dictionary offline".into()));
        }
        Ok(self.entries.get(word).cloned().unwrap_or(Lookup::NotFound {
            suggestions: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::all_children;

    #[tokio::test]
    async fn test_children_paginate() {
        let ws = InMemoryWorkspace::new().with_page_size(2);
        ws.add_page(None, "root", Utc::now(), None);
        for i in 0..5 {
            ws.add_list_item("root", &format!("b{}", i), vec![TextRun::plain("x")]);
        }
        let first = ws.get_children("root", None).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let all = all_children(&ws, "root").await.unwrap();
        let ids: Vec<_> = all.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b0", "b1", "b2", "b3", "b4"]);
    }

    #[tokio::test]
    async fn test_append_to_unknown_record_fails() {
        let ws = InMemoryWorkspace::new();
        let err = ws
            .append_content("nope", &[Block::Divider])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_static_lexicon() {
        let lex = StaticLexicon::new().with_entry("x", Lookup::Found(vec![]));
        assert_eq!(lex.lookup("x").await.unwrap(), Lookup::Found(vec![]));
        assert!(StaticLexicon::unavailable().lookup("x").await.is_err());
    }
}
