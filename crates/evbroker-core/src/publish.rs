use std::sync::Arc;

use chrono::Utc;
use evbroker_schema::SchemaRegistry;
use evbroker_store::{EventStore, TopicStore};
use evbroker_types::{BrokerError, BrokerResult, Event, EventDraft, EventId};

use crate::dispatcher_manager::DispatcherManager;

/// Sequences, validates, and durably stores a batch of events for a topic,
/// then wakes that topic's dispatcher.
///
/// Schema validation is opt-in per event type: a payload is checked against
/// the topic's registered schema only when one has been registered for that
/// event type (schema registration is additive, never mandatory).
pub struct PublishService {
    topic_store: Arc<TopicStore>,
    event_store: Arc<EventStore>,
    schemas: Arc<SchemaRegistry>,
    dispatchers: Arc<DispatcherManager>,
}

impl PublishService {
    pub fn new(
        topic_store: Arc<TopicStore>,
        event_store: Arc<EventStore>,
        schemas: Arc<SchemaRegistry>,
        dispatchers: Arc<DispatcherManager>,
    ) -> Self {
        Self {
            topic_store,
            event_store,
            schemas,
            dispatchers,
        }
    }

    /// Publish `drafts` to `topic` as a single batch sharing one timestamp.
    ///
    /// Validation happens before any event in the batch is sequenced or
    /// stored: either every draft is accepted, or none are — a batch never
    /// commits partially.
    pub fn publish(
        &self,
        tenant: &str,
        namespace: &str,
        topic: &str,
        drafts: Vec<EventDraft>,
    ) -> BrokerResult<Vec<Event>> {
        if drafts.is_empty() {
            return Err(BrokerError::InvalidRequest("publish batch must contain at least one event".to_string()));
        }

        let topic_config = self.topic_store.get_topic(tenant, namespace, topic)?;

        for draft in &drafts {
            match topic_config.schemas.get(&draft.event_type) {
                Some(schema) => {
                    self.schemas.register(topic, schema)?;
                    self.schemas.validate(topic, &draft.event_type, &draft.payload)?;
                }
                None if !draft.payload.is_object() => {
                    return Err(BrokerError::InvalidEventPayload(format!(
                        "event type '{}' has no registered schema, but its payload must still be a JSON object",
                        draft.event_type
                    )));
                }
                None => {}
            }
        }

        let batch_timestamp = Utc::now();
        let mut events = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let sequence = self.topic_store.get_and_increment_sequence(tenant, namespace, topic)?;
            events.push(Event {
                id: EventId::tenant_scoped(tenant, namespace, topic, sequence),
                sequence,
                event_type: draft.event_type,
                timestamp: batch_timestamp,
                payload: draft.payload,
            });
        }

        self.event_store.store_events(tenant, namespace, topic, &events)?;
        self.dispatchers.notify_events_published(tenant, namespace, topic);

        tracing::debug!(tenant, namespace, topic, count = events.len(), "published events");

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evbroker_types::ResourceId;
    use evbroker_webhook::WebhookClient;
    use tempfile::tempdir;

    fn service(dir: &std::path::Path) -> (PublishService, Arc<TopicStore>) {
        let topic_store = Arc::new(TopicStore::new(dir));
        let event_store = Arc::new(EventStore::new(dir));
        let schemas = Arc::new(SchemaRegistry::new());
        let dispatchers = Arc::new(DispatcherManager::new(event_store.clone(), Arc::new(WebhookClient::new().unwrap())));
        let service = PublishService::new(topic_store.clone(), event_store, schemas, dispatchers);
        (service, topic_store)
    }

    #[test]
    fn publish_sequences_and_stores_events() {
        let dir = tempdir().unwrap();
        let (service, topic_store) = service(dir.path());
        topic_store
            .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
            .unwrap();

        let drafts = vec![
            EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"a": 1}) },
            EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"a": 2}) },
        ];

        let events = service.publish("acme", "prod", "orders", drafts).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
        assert_eq!(events[0].timestamp, events[1].timestamp);
    }

    #[test]
    fn publish_rejects_payload_violating_registered_schema() {
        let dir = tempdir().unwrap();
        let (service, topic_store) = service(dir.path());
        topic_store
            .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
            .unwrap();
        topic_store
            .update_schemas(
                "acme",
                "prod",
                "orders",
                vec![evbroker_types::Schema {
                    event_type: "order.created".to_string(),
                    body: serde_json::json!({
                        "type": "object",
                        "required": ["orderId"],
                        "properties": { "orderId": { "type": "string" } }
                    }),
                }],
            )
            .unwrap();

        let drafts = vec![EventDraft {
            event_type: "order.created".to_string(),
            payload: serde_json::json!({"orderId": 123}),
        }];

        let err = service.publish("acme", "prod", "orders", drafts).unwrap_err();
        assert!(matches!(err, evbroker_types::BrokerError::SchemaValidation { .. }));
    }

    #[test]
    fn publish_to_missing_topic_fails() {
        let dir = tempdir().unwrap();
        let (service, _topic_store) = service(dir.path());
        let drafts = vec![EventDraft { event_type: "x".to_string(), payload: serde_json::json!({}) }];
        let err = service.publish("acme", "prod", "orders", drafts).unwrap_err();
        assert!(matches!(err, evbroker_types::BrokerError::TopicNotFound(_)));
    }

    #[test]
    fn publish_rejects_an_empty_batch() {
        let dir = tempdir().unwrap();
        let (service, topic_store) = service(dir.path());
        topic_store
            .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
            .unwrap();

        let err = service.publish("acme", "prod", "orders", vec![]).unwrap_err();
        assert!(matches!(err, evbroker_types::BrokerError::InvalidRequest(_)));
    }

    #[test]
    fn publish_rejects_non_object_payload_even_without_a_registered_schema() {
        let dir = tempdir().unwrap();
        let (service, topic_store) = service(dir.path());
        topic_store
            .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
            .unwrap();

        let drafts = vec![EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!("not an object") }];
        let err = service.publish("acme", "prod", "orders", drafts).unwrap_err();
        assert!(matches!(err, evbroker_types::BrokerError::InvalidEventPayload(_)));

        // The rejected batch never reached the store.
        assert!(service.event_store.get_events("acme", "prod", "orders", None, 10).unwrap().is_empty());
    }

    #[test]
    fn publish_accepts_object_payload_with_no_registered_schema() {
        let dir = tempdir().unwrap();
        let (service, topic_store) = service(dir.path());
        topic_store
            .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
            .unwrap();

        let drafts = vec![EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"a": 1}) }];
        let events = service.publish("acme", "prod", "orders", drafts).unwrap();
        assert_eq!(events.len(), 1);
    }
}
