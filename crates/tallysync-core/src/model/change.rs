// ── Change-feed payloads ──
//
// Row-level change notifications as delivered by the live change feed.
// The payload is opaque to the core: only the table and change type are
// interpreted, the row images pass through to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use super::entity_id::EntityId;

/// Kind of row mutation reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// One change notification for one watched table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,

    #[serde(rename = "eventType")]
    pub change_type: ChangeType,

    /// Row image after the change (absent for deletes).
    #[serde(default)]
    pub new: Option<Value>,

    /// Row image before the change, when the feed provides it.
    #[serde(default)]
    pub old: Option<Value>,

    #[serde(default)]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            table: table.into(),
            change_type,
            new: None,
            old: None,
            commit_timestamp: None,
        }
    }

    pub fn with_new(mut self, row: Value) -> Self {
        self.new = Some(row);
        self
    }

    pub fn with_old(mut self, row: Value) -> Self {
        self.old = Some(row);
        self
    }

    /// Id of the affected row, taken from the new image, else the old one.
    pub fn record_id(&self) -> Option<EntityId> {
        [self.new.as_ref(), self.old.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|row| row.get("id").and_then(EntityId::from_json))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_feed_payload() {
        let change: ChangeEvent = serde_json::from_value(json!({
            "table": "transactions",
            "eventType": "UPDATE",
            "new": { "id": 5, "status": "validated" },
            "old": { "id": 5 },
            "commit_timestamp": "2026-03-02T09:15:00Z"
        }))
        .unwrap();

        assert_eq!(change.change_type, ChangeType::Update);
        assert_eq!(change.record_id(), Some(EntityId::Number(5)));
        assert!(change.commit_timestamp.is_some());
    }

    #[test]
    fn delete_takes_id_from_old_image() {
        let change = ChangeEvent::new("partners", ChangeType::Delete).with_old(json!({ "id": "p-1" }));
        assert_eq!(change.record_id(), Some(EntityId::Key("p-1".into())));
        assert_eq!(change.change_type.to_string(), "DELETE");
    }
}
