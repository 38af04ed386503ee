//! Vocabulary resolution.
//!
//! Each extracted unit is routed to the word or expression collection,
//! matched against an existing entry by exact title, and either linked to
//! that entry or written as a new one. At most one entry may exist per
//! title and collection; finding more aborts the run.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::blocks::{cross_reference, entry_body};
use crate::config::Config;
use crate::error::SyncError;
use crate::models::{Collection, EntryRef, ExtractedUnit, Filter, Lookup, PropertyValue, Sense};
use crate::traits::{query_all, Lexicon, Workspace};

/// Deep link to a block: `{base}/{page}?{view}#{block}`, ids normalized.
///
/// The host's link parser reads the block anchor first, then the page id in
/// front of the query string; this exact shape is what it deep-links.
pub fn cross_reference_url(
    link_base: &str,
    view_param: &str,
    unit: &ExtractedUnit,
) -> String {
    format!(
        "{}/{}?{}#{}",
        link_base,
        crate::models::normalize_id(&unit.source_document_id),
        view_param,
        crate::models::normalize_id(&unit.source_block_id)
    )
}

pub struct Resolver<'a, W: Workspace + ?Sized, L: Lexicon + ?Sized> {
    workspace: &'a W,
    lexicon: &'a L,
    config: &'a Config,
    /// Entries created during this run, by collection and title.
    created: HashMap<(Collection, String), String>,
    /// Words whose entry was created bare because the dictionary failed.
    lookup_failures: Vec<String>,
}

impl<'a, W: Workspace + ?Sized, L: Lexicon + ?Sized> Resolver<'a, W, L> {
    pub fn new(workspace: &'a W, lexicon: &'a L, config: &'a Config) -> Self {
        Self {
            workspace,
            lexicon,
            config,
            created: HashMap::new(),
            lookup_failures: Vec::new(),
        }
    }

    pub fn collection_id(&self, collection: Collection) -> &str {
        match collection {
            Collection::Word => &self.config.collections.words,
            Collection::Expression => &self.config.collections.expressions,
        }
    }

    pub fn lookup_failures(&self) -> &[String] {
        &self.lookup_failures
    }

    /// Look up the single entry titled `text`.
    pub async fn find_entry(
        &self,
        collection: Collection,
        text: &str,
    ) -> Result<Option<String>, SyncError> {
        let collection_id = self.collection_id(collection);
        let filter = Filter::TitleEquals {
            property: self.config.properties.title.clone(),
            value: text.to_string(),
        };
        let records = query_all(self.workspace, collection_id, &filter)
            .await
            .map_err(|e| SyncError::workspace("query", collection_id, e))?;

        match records.len() {
            0 => Ok(None),
            1 => Ok(records.into_iter().next().map(|r| r.id)),
            count => Err(SyncError::AmbiguousEntry {
                text: text.to_string(),
                collection,
                count,
            }),
        }
    }

    /// Link `unit` to its entry, creating the entry first if needed.
    pub async fn resolve(&mut self, unit: &ExtractedUnit) -> Result<EntryRef, SyncError> {
        let collection = Collection::for_text(&unit.text);
        let url = cross_reference_url(
            &self.config.workspace.link_base,
            &self.config.workspace.view_param,
            unit,
        );

        let key = (collection, unit.text.clone());
        let existing = match self.created.get(&key) {
            Some(id) => Some(id.clone()),
            None => self.find_entry(collection, &unit.text).await?,
        };

        let (entry_id, created, bare) = match existing {
            Some(id) => {
                debug!(unit = %unit.text, entry = %id, "existing entry");
                (id, false, false)
            }
            None => {
                let senses = match collection {
                    Collection::Word => self.enrichment(&unit.text).await,
                    Collection::Expression => Vec::new(),
                };
                let bare = senses.is_empty();
                let id = self.create_entry(collection, &unit.text, &senses).await?;
                info!(unit = %unit.text, entry = %id, %collection, bare, "created entry");
                self.created.insert(key, id.clone());
                (id, true, bare)
            }
        };

        self.workspace
            .append_content(&entry_id, &[cross_reference(&unit.text, &url)])
            .await
            .map_err(|e| SyncError::workspace("append_content", &entry_id, e))?;

        Ok(EntryRef {
            entry_id,
            collection,
            created,
            bare,
        })
    }

    /// Dictionary senses for a new word; empty when unknown or unavailable.
    async fn enrichment(&mut self, word: &str) -> Vec<Sense> {
        match self.lookup(word).await {
            Ok(senses) => senses,
            Err(e) => {
                warn!("{}; creating bare entry", e);
                self.lookup_failures.push(word.to_string());
                Vec::new()
            }
        }
    }

    async fn lookup(&self, word: &str) -> Result<Vec<Sense>, SyncError> {
        match self.lexicon.lookup(word).await {
            Ok(Lookup::Found(senses)) => Ok(senses),
            Ok(Lookup::NotFound { suggestions }) => {
                debug!(word, ?suggestions, "not in dictionary");
                Ok(Vec::new())
            }
            Err(source) => Err(SyncError::LookupUnavailable {
                word: word.to_string(),
                source,
            }),
        }
    }

    async fn create_entry(
        &self,
        collection: Collection,
        text: &str,
        senses: &[Sense],
    ) -> Result<String, SyncError> {
        let collection_id = self.collection_id(collection);
        let fields = [(
            self.config.properties.title.clone(),
            PropertyValue::Title(text.to_string()),
        )];
        let record = self
            .workspace
            .create_record(collection_id, &fields, &entry_body(senses))
            .await
            .map_err(|e| SyncError::workspace("create_record", collection_id, e))?;
        Ok(record.id)
    }
}
