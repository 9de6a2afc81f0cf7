//! Persisted marker recording when the search index was last rebuilt.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Collection holding the marker document.
pub const SYNC_MARKER_COLLECTION: &str = "refresh";
/// Fixed identifier of the marker document.
pub const SYNC_MARKER_ID: &str = "searchIndex";

/// Singleton `{ lastSyncTime }` document, overwritten on every sync attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMarker {
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl SyncMarker {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            last_sync_time: Some(time),
        }
    }

    /// Read a marker from stored fields.
    ///
    /// A `lastSyncTime` that is not an RFC 3339 timestamp reads as absent.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let last_sync_time = fields
            .get("lastSyncTime")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc));

        if last_sync_time.is_none() && fields.get("lastSyncTime").is_some_and(|v| !v.is_null()) {
            tracing::warn!("Ignoring unreadable lastSyncTime in sync marker");
        }

        Self { last_sync_time }
    }

    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "lastSyncTime".to_string(),
            self.last_sync_time
                .map(|t| Value::String(t.to_rfc3339()))
                .unwrap_or(Value::Null),
        );
        fields
    }

    /// Whether a full reindex is due at `now`.
    pub fn is_due(
        marker: Option<&SyncMarker>,
        now: DateTime<Utc>,
        staleness: chrono::Duration,
    ) -> bool {
        match marker.and_then(|m| m.last_sync_time) {
            None => true,
            Some(last) => now - last >= staleness,
        }
    }
}
