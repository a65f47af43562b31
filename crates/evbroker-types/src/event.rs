use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::EventId;

/// A single durably-stored event within a topic's sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub sequence: u64,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

/// A caller-supplied event awaiting sequencing and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub event_type: String,
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_json() {
        let event = Event {
            id: EventId::canonical("orders", 1),
            sequence: 1,
            event_type: "order.created".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({"orderId": "abc"}),
        };
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
    }
}
