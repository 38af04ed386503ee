use anyhow::{Context, Result};

use crate::config::Config;
use crate::connector_notion::NotionClient;
use crate::ingest::Syncer;
use crate::lexicon::DisabledLexicon;
use crate::models::ContextDocument;
use crate::sync_state::is_stale;
use crate::traits::Workspace;

/// Status line for one context document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextStatus {
    pub id: String,
    pub state: String,
    pub stale: bool,
}

pub fn status_of(doc: &ContextDocument) -> ContextStatus {
    ContextStatus {
        id: doc.id.clone(),
        state: match doc.last_extracted_at {
            Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
            None => "never".to_string(),
        },
        stale: is_stale(doc),
    }
}

pub async fn get_contexts(config: &Config, workspace: &dyn Workspace) -> Result<Vec<ContextStatus>> {
    let syncer = Syncer::new(config, workspace, &DisabledLexicon);
    let roots = syncer
        .context_roots()
        .await
        .context("Failed to list context documents")?;

    let mut statuses = Vec::with_capacity(roots.len());
    for id in roots {
        let status = match workspace.get_context(&id).await {
            Ok(doc) => status_of(&doc),
            Err(e) => ContextStatus {
                id,
                state: format!("ERROR ({})", e),
                stale: false,
            },
        };
        statuses.push(status);
    }
    Ok(statuses)
}

pub async fn list_contexts(config: &Config) -> Result<()> {
    let workspace = NotionClient::new(config)?;
    let statuses = get_contexts(config, &workspace).await?;

    println!("{:<34} {:<18} STALE", "CONTEXT", "LAST EXTRACTED");
    for s in &statuses {
        println!("{:<34} {:<18} {}", s.id, s.state, s.stale);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_status_of() {
        let doc = ContextDocument {
            id: "c1".into(),
            last_edited_at: Utc.with_ymd_and_hms(2024, 3, 9, 10, 5, 0).unwrap(),
            last_extracted_at: None,
        };
        let s = status_of(&doc);
        assert_eq!(s.state, "never");
        assert!(s.stale);

        let synced = ContextDocument {
            last_extracted_at: Some(Utc.with_ymd_and_hms(2024, 3, 9, 10, 5, 30).unwrap()),
            ..doc
        };
        let s = status_of(&synced);
        assert_eq!(s.state, "2024-03-09 10:05");
        assert!(!s.stale);
    }
}
