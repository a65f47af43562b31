use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ResourceId;

/// A JSON-Schema document governing one event type on a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub event_type: String,
    pub body: Value,
}

/// Durable topic configuration: identity, tenancy, sequence cursor, schemas.
///
/// The schema set is additive-only — `updateSchemas` can grow it or replace
/// an existing event type's body, but never drop an event type that was
/// already registered (spec non-goal: schema removal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub resource_id: ResourceId,
    pub tenant_resource_id: ResourceId,
    pub namespace_resource_id: ResourceId,
    pub sequence: u64,
    pub schemas: BTreeMap<String, Schema>,
}

impl Topic {
    pub fn new(
        name: impl Into<String>,
        tenant_resource_id: ResourceId,
        namespace_resource_id: ResourceId,
    ) -> Self {
        Self {
            name: name.into(),
            resource_id: ResourceId::new(),
            tenant_resource_id,
            namespace_resource_id,
            sequence: 0,
            schemas: BTreeMap::new(),
        }
    }

    pub fn has_schema(&self, event_type: &str) -> bool {
        self.schemas.contains_key(event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_topic_starts_unsequenced_and_schemaless() {
        let topic = Topic::new("orders", ResourceId::new(), ResourceId::new());
        assert_eq!(topic.sequence, 0);
        assert!(topic.schemas.is_empty());
        assert!(!topic.has_schema("order.created"));
    }

    #[test]
    fn topic_round_trips_through_json() {
        let mut topic = Topic::new("orders", ResourceId::new(), ResourceId::new());
        topic.schemas.insert(
            "order.created".to_string(),
            Schema {
                event_type: "order.created".to_string(),
                body: serde_json::json!({"type": "object"}),
            },
        );
        let encoded = serde_json::to_string(&topic).unwrap();
        let decoded: Topic = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, topic);
    }
}
