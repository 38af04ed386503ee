//! Tree walker and unit extractor.
//!
//! [`unfold`] flattens a context document into its blocks, skipping nested
//! pages that were already extracted since their last edit. Each emitted
//! node is tagged with its owning page so cross-references can deep-link
//! back to it. [`extract_units`] then picks the annotated list items.
//!
//! Traversal is pre-order depth first over an explicit stack of
//! `(node, owner)` pairs; a node's children are fetched in full (all
//! continuation pages) before any of them is visited.

use std::collections::HashSet;

use tracing::debug;

use crate::error::SyncError;
use crate::models::{normalize_id, DocumentNode, ExtractedUnit, NodeKind};
use crate::sync_state::SyncTracker;
use crate::traits::{all_children, Workspace};

/// Output of [`unfold`].
#[derive(Debug, Default)]
pub struct Unfolded {
    /// Visited nodes in document order, root excluded.
    pub nodes: Vec<DocumentNode>,
    /// Stale documents whose markers are committed after resolution, root first.
    pub sync_candidates: Vec<String>,
}

/// Walk the subtree rooted at `root_id`.
///
/// The root must be a page. A root that is not stale yields an empty
/// result; so does every nested page that is not stale, together with its
/// whole subtree. Nested pages listed in `visited` were already walked in
/// this run and are skipped the same way.
pub async fn unfold<W: Workspace + ?Sized>(
    workspace: &W,
    tracker: &SyncTracker<'_, W>,
    root_id: &str,
    visited: &HashSet<String>,
) -> Result<Unfolded, SyncError> {
    let root = workspace
        .get_node(root_id)
        .await
        .map_err(|e| SyncError::workspace("get_node", root_id, e))?;
    if root.kind != NodeKind::Document {
        return Err(SyncError::InvalidRootKind {
            id: root_id.to_string(),
            kind: root.kind.as_str().to_string(),
        });
    }

    let mut out = Unfolded::default();
    let root_id = normalize_id(&root.id);
    if !tracker.check(&root_id).await? {
        debug!(root = %root_id, "root already extracted, skipping");
        return Ok(out);
    }
    out.sync_candidates.push(root_id.clone());

    let mut stack: Vec<(DocumentNode, String)> = Vec::new();
    push_children(workspace, &root_id, &root_id, &mut stack).await?;

    while let Some((mut node, owner)) = stack.pop() {
        let node_id = normalize_id(&node.id);

        // Blocks below a page belong to that page; everything else inherits.
        let child_owner = if node.kind == NodeKind::Document {
            if visited.contains(&node_id) {
                debug!(page = %node_id, "nested page already walked, skipping subtree");
                continue;
            }
            if !tracker.check(&node_id).await? {
                debug!(page = %node_id, "nested page already extracted, skipping subtree");
                continue;
            }
            out.sync_candidates.push(node_id.clone());
            node_id.clone()
        } else {
            owner.clone()
        };

        node.owning_document_id = Some(owner);
        let has_children = node.has_children;
        out.nodes.push(node);

        if has_children {
            push_children(workspace, &node_id, &child_owner, &mut stack).await?;
        }
    }

    debug!(
        root = %root_id,
        nodes = out.nodes.len(),
        pages = out.sync_candidates.len(),
        "unfolded"
    );
    Ok(out)
}

async fn push_children<W: Workspace + ?Sized>(
    workspace: &W,
    parent_id: &str,
    owner: &str,
    stack: &mut Vec<(DocumentNode, String)>,
) -> Result<(), SyncError> {
    let children = all_children(workspace, parent_id)
        .await
        .map_err(|e| SyncError::workspace("get_children", parent_id, e))?;
    // Reversed so the first child is popped first.
    stack.extend(
        children
            .into_iter()
            .rev()
            .map(|child| (child, owner.to_string())),
    );
    Ok(())
}

/// The unit carried by a node, if any.
///
/// Only list items qualify, and only through the first run that is both
/// bold and italic. Surrounding whitespace is dropped before routing, so
/// `"Enamor "` is the word `Enamor`, not an expression.
pub fn extract_unit(node: &DocumentNode) -> Option<ExtractedUnit> {
    if node.kind != NodeKind::ListItem {
        return None;
    }
    let run = node
        .rich_text
        .iter()
        .find(|run| run.bold && run.italic && !run.plain_text.trim().is_empty())?;

    let owner = node.owning_document_id.as_deref().unwrap_or(&node.id);
    Some(ExtractedUnit {
        text: run.plain_text.trim().to_string(),
        source_document_id: normalize_id(owner),
        source_block_id: normalize_id(&node.id),
    })
}

pub fn extract_units(nodes: &[DocumentNode]) -> Vec<ExtractedUnit> {
    nodes.iter().filter_map(extract_unit).collect()
}
