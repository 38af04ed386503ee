//! Sync orchestration.
//!
//! Coordinates the full run: contexts → unfold + staleness → unit
//! extraction → resolution → marker commits. Markers are committed only
//! after every unit has been resolved, so an interrupted run re-processes
//! documents on the next invocation instead of losing units. Cross-references
//! written before an interruption are appended again on that next run.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::connector_notion::NotionClient;
use crate::error::{SyncError, WorkspaceError};
use crate::lexicon::{create_lexicon, DisabledLexicon};
use crate::models::{normalize_id, ExtractedUnit, Filter};
use crate::resolver::Resolver;
use crate::sync_state::SyncTracker;
use crate::traits::{query_all, Lexicon, Workspace};
use crate::walker::{extract_units, unfold};

/// Units and pending markers gathered from a set of roots.
#[derive(Debug, Default)]
pub struct Collected {
    pub units: Vec<ExtractedUnit>,
    /// Documents to commit, in discovery order, without duplicates.
    pub sync_candidates: Vec<String>,
    pub roots_scanned: usize,
    /// Roots whose traversal failed, with the reason.
    pub roots_skipped: Vec<(String, String)>,
}

/// Counters for a completed run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub roots_scanned: usize,
    pub roots_skipped: Vec<(String, String)>,
    pub units_found: usize,
    /// Units dropped on a recoverable error.
    pub units_skipped: usize,
    pub entries_created: usize,
    pub bare_entries: usize,
    pub cross_references: usize,
    /// Words whose dictionary lookup failed.
    pub lookup_failures: Vec<String>,
    pub committed: Vec<String>,
    pub committed_at: Option<DateTime<Utc>>,
}

pub struct Syncer<'a> {
    config: &'a Config,
    workspace: &'a dyn Workspace,
    lexicon: &'a dyn Lexicon,
}

impl<'a> Syncer<'a> {
    pub fn new(config: &'a Config, workspace: &'a dyn Workspace, lexicon: &'a dyn Lexicon) -> Self {
        Self {
            config,
            workspace,
            lexicon,
        }
    }

    fn tracker(&self) -> SyncTracker<'a, dyn Workspace + 'a> {
        SyncTracker::new(self.workspace, &self.config.properties.last_extracted)
    }

    /// Ids of the documents tagged as contexts.
    pub async fn context_roots(&self) -> Result<Vec<String>, SyncError> {
        let db = &self.config.collections.contexts;
        let filter = Filter::MultiSelectContains {
            property: self.config.properties.context_tag_property.clone(),
            value: self.config.properties.context_tag.clone(),
        };
        let records = query_all(self.workspace, db, &filter)
            .await
            .map_err(|e| SyncError::workspace("query", db.as_str(), e))?;

        let mut roots = Vec::with_capacity(records.len());
        for record in records {
            if record.object != "page" {
                return Err(SyncError::workspace(
                    "query",
                    db.as_str(),
                    WorkspaceError::Decode(format!(
                        "context {} is a '{}', expected a page",
                        record.id, record.object
                    )),
                ));
            }
            roots.push(record.id);
        }
        Ok(roots)
    }

    /// Unfold every root and extract its units.
    ///
    /// A root that fails to traverse is skipped with a warning; none of its
    /// units or markers are kept. A root that is not a page aborts.
    pub async fn collect(&self, roots: &[String]) -> Result<Collected, SyncError> {
        let tracker = self.tracker();
        let mut out = Collected::default();
        let mut seen: HashSet<String> = HashSet::new();

        for root in roots {
            let root = normalize_id(root);
            if seen.contains(&root) {
                continue;
            }
            match unfold(self.workspace, &tracker, &root, &seen).await {
                Ok(unfolded) => {
                    out.roots_scanned += 1;
                    let units = extract_units(&unfolded.nodes);
                    info!(
                        root = %root,
                        nodes = unfolded.nodes.len(),
                        units = units.len(),
                        "scanned context"
                    );
                    out.units.extend(units);
                    for id in unfolded.sync_candidates {
                        if seen.insert(id.clone()) {
                            out.sync_candidates.push(id);
                        }
                    }
                }
                Err(e @ SyncError::InvalidRootKind { .. }) => return Err(e),
                Err(e) => {
                    warn!(root = %root, "skipping context: {}", e);
                    out.roots_skipped.push((root, e.to_string()));
                }
            }
        }

        Ok(out)
    }

    /// Run a full sync over `roots`.
    pub async fn run(&self, roots: &[String]) -> Result<SyncReport, SyncError> {
        let collected = self.collect(roots).await?;
        let mut report = SyncReport {
            roots_scanned: collected.roots_scanned,
            roots_skipped: collected.roots_skipped,
            units_found: collected.units.len(),
            ..Default::default()
        };

        let mut resolver = Resolver::new(self.workspace, self.lexicon, self.config);
        for unit in &collected.units {
            match resolver.resolve(unit).await {
                Ok(entry) => {
                    report.cross_references += 1;
                    if entry.created {
                        report.entries_created += 1;
                        if entry.bare {
                            report.bare_entries += 1;
                        }
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(
                        unit = %unit.text,
                        document = %unit.source_document_id,
                        block = %unit.source_block_id,
                        "sync aborted, no documents committed: {}",
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(unit = %unit.text, block = %unit.source_block_id, "unit skipped: {}", e);
                    report.units_skipped += 1;
                }
            }
        }
        report.lookup_failures = resolver.lookup_failures().to_vec();

        // Commit last: only now is every unit of every candidate resolved.
        let tracker = self.tracker();
        for id in &collected.sync_candidates {
            // One timestamp per write, taken as it is sent.
            let at = tracker.commit(id, Utc::now()).await?;
            report.committed_at = Some(at);
            report.committed.push(id.clone());
        }

        Ok(report)
    }

    /// Clear the marker of every root so the next run re-processes it.
    pub async fn reset(&self, roots: &[String]) -> Result<usize, SyncError> {
        let tracker = self.tracker();
        for root in roots {
            tracker.reset(root).await?;
        }
        Ok(roots.len())
    }
}

fn connect(config: &Config) -> Result<(NotionClient, Box<dyn Lexicon>)> {
    let workspace = NotionClient::new(config)?;
    let lexicon = create_lexicon(&config.lexicon).context("Failed to initialize dictionary")?;
    Ok((workspace, lexicon))
}

async fn resolve_roots(syncer: &Syncer<'_>, root: Option<String>) -> Result<Vec<String>> {
    match root {
        Some(id) => Ok(vec![id]),
        None => syncer
            .context_roots()
            .await
            .context("Failed to list context documents"),
    }
}

pub async fn run_sync(config: &Config, root: Option<String>, dry_run: bool) -> Result<()> {
    let (workspace, lexicon) = connect(config)?;
    let syncer = Syncer::new(config, &workspace, lexicon.as_ref());
    let roots = resolve_roots(&syncer, root).await?;

    if dry_run {
        let collected = syncer.collect(&roots).await?;
        println!("sync (dry-run)");
        println!("  contexts scanned: {}", collected.roots_scanned);
        println!("  contexts skipped: {}", collected.roots_skipped.len());
        println!("  units found: {}", collected.units.len());
        for unit in &collected.units {
            println!(
                "    {:<24} {} {}",
                unit.text,
                crate::models::Collection::for_text(&unit.text),
                unit.source_block_id
            );
        }
        println!("  documents pending commit: {}", collected.sync_candidates.len());
        return Ok(());
    }

    let report = syncer.run(&roots).await.context("Sync aborted")?;

    println!("sync");
    println!("  contexts scanned: {}", report.roots_scanned);
    println!("  contexts skipped: {}", report.roots_skipped.len());
    for (id, reason) in &report.roots_skipped {
        println!("    {}: {}", id, reason);
    }
    println!("  units found: {}", report.units_found);
    if report.units_skipped > 0 {
        println!("  units skipped: {}", report.units_skipped);
    }
    println!(
        "  entries created: {} ({} bare)",
        report.entries_created, report.bare_entries
    );
    println!("  cross-references appended: {}", report.cross_references);
    println!("  enrichments skipped: {}", report.lookup_failures.len());
    for word in &report.lookup_failures {
        println!("    {}", word);
    }
    println!("  documents committed: {}", report.committed.len());
    if let Some(at) = report.committed_at {
        println!("  marker: {}", at.to_rfc3339());
    }
    println!("ok");

    Ok(())
}

pub async fn run_reset(config: &Config, root: Option<String>) -> Result<()> {
    let workspace = NotionClient::new(config)?;
    let syncer = Syncer::new(config, &workspace, &DisabledLexicon);
    let roots = resolve_roots(&syncer, root).await?;
    let n = syncer.reset(&roots).await.context("Reset failed")?;
    println!("reset {} context(s)", n);
    Ok(())
}
