use crate::domain::record::StagingKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work item body on the two fetch queues. Delivery is at-least-once, so
/// duplicate symbols may arrive; consumers must tolerate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Modify,
    Delete,
}

/// Change notification emitted by every staging put, consumed by the
/// reconciler. `source_item` is the fetch work item whose write produced the
/// event; it is acknowledged only once the join lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingEvent {
    pub record_key: String,
    pub kind: StagingKind,
    pub event: ChangeKind,
    #[serde(default)]
    pub source_item: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn staging_event_decodes_from_queue_payload() {
        let id = Uuid::new_v4();
        let v = json!({
            "record_key": "price_AAPL",
            "kind": "price",
            "event": "insert",
            "source_item": id,
        });

        let ev: StagingEvent = serde_json::from_value(v).unwrap();
        assert_eq!(ev.record_key, "price_AAPL");
        assert_eq!(ev.kind, StagingKind::Price);
        assert_eq!(ev.event, ChangeKind::Insert);
        assert_eq!(ev.source_item, Some(id));
    }

    #[test]
    fn source_item_defaults_to_none() {
        let v = json!({
            "record_key": "sentiment_AAPL",
            "kind": "sentiment",
            "event": "modify",
        });

        let ev: StagingEvent = serde_json::from_value(v).unwrap();
        assert_eq!(ev.source_item, None);
    }
}
