//! Per-document sync markers.
//!
//! A context document is stale when it was edited after its last successful
//! extraction. Both timestamps are compared at minute resolution because the
//! stored marker only keeps minutes: comparing seconds would report a page as
//! stale right after it was synced.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use tracing::debug;

use crate::error::{SyncError, WorkspaceResult};
use crate::models::{ContextDocument, PropertyValue};
use crate::traits::Workspace;

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// `true` when never extracted, or edited in a later minute than extracted.
pub fn is_stale(doc: &ContextDocument) -> bool {
    match doc.last_extracted_at {
        None => true,
        Some(extracted) => truncate_to_minute(doc.last_edited_at) > truncate_to_minute(extracted),
    }
}

/// Reads and writes the `last extracted` marker of context documents.
pub struct SyncTracker<'a, W: Workspace + ?Sized> {
    workspace: &'a W,
    property: &'a str,
}

impl<'a, W: Workspace + ?Sized> SyncTracker<'a, W> {
    pub fn new(workspace: &'a W, property: &'a str) -> Self {
        Self {
            workspace,
            property,
        }
    }

    /// Load the document's marker state.
    pub async fn load(&self, id: &str) -> WorkspaceResult<ContextDocument> {
        self.workspace.get_context(id).await
    }

    /// Fetch the document and report whether it needs extraction.
    pub async fn check(&self, id: &str) -> Result<bool, SyncError> {
        let doc = self
            .load(id)
            .await
            .map_err(|e| SyncError::workspace("get_context", id, e))?;
        let stale = is_stale(&doc);
        debug!(
            document = %id,
            last_edited = %doc.last_edited_at,
            last_extracted = ?doc.last_extracted_at,
            stale,
            "sync state"
        );
        Ok(stale)
    }

    /// Record a successful extraction at `now`, truncated to the minute.
    ///
    /// Must only be called once every unit sourced from the document has been
    /// resolved.
    pub async fn commit(&self, id: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, SyncError> {
        let at = truncate_to_minute(now);
        self.workspace
            .update_record(id, &[(self.property.to_string(), PropertyValue::Date(at))])
            .await
            .map_err(|e| SyncError::workspace("update_record", id, e))?;
        Ok(at)
    }

    /// Clear the marker so the next run treats the document as never synced.
    pub async fn reset(&self, id: &str) -> Result<(), SyncError> {
        self.workspace
            .update_record(id, &[(self.property.to_string(), PropertyValue::NoDate)])
            .await
            .map_err(|e| SyncError::workspace("update_record", id, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, h, m, s).unwrap()
    }

    fn doc(edited: DateTime<Utc>, extracted: Option<DateTime<Utc>>) -> ContextDocument {
        ContextDocument {
            id: "ctx".into(),
            last_edited_at: edited,
            last_extracted_at: extracted,
        }
    }

    #[test]
    fn test_never_extracted_is_stale() {
        assert!(is_stale(&doc(at(10, 0, 0), None)));
    }

    #[test]
    fn test_same_minute_is_not_stale() {
        assert!(!is_stale(&doc(at(10, 5, 59), Some(at(10, 5, 0)))));
        assert!(!is_stale(&doc(at(10, 5, 0), Some(at(10, 5, 30)))));
    }

    #[test]
    fn test_later_minute_is_stale() {
        assert!(is_stale(&doc(at(10, 6, 0), Some(at(10, 5, 59)))));
    }

    #[test]
    fn test_earlier_edit_is_not_stale() {
        assert!(!is_stale(&doc(at(9, 0, 0), Some(at(10, 0, 0)))));
    }

    #[test]
    fn test_timezone_normalized() {
        let edited = chrono::FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 12, 5, 10)
            .unwrap()
            .with_timezone(&Utc);
        assert!(!is_stale(&doc(edited, Some(at(10, 5, 0)))));
    }

    #[test]
    fn test_truncate_to_minute() {
        let ts = at(10, 5, 42) + TimeDelta::milliseconds(123);
        assert_eq!(truncate_to_minute(ts), at(10, 5, 0));
    }
}
