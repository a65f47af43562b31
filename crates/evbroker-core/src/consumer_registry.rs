use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use evbroker_types::{BrokerError, BrokerResult, Consumer, DeliveryBinding, EventId, ResourceId};

use crate::dispatcher::DispatchTarget;

/// In-memory registry of consumers and their per-topic delivery cursors.
///
/// Consumer registration is not durable storage in its own right — callers
/// that need registrations to survive a restart persist
/// `ConsumerRegistration` records themselves (spec.md §4.4); this registry
/// is the engine's live view, rebuilt from whatever persistence layer a
/// caller wires up.
pub struct ConsumerRegistry {
    consumers: RwLock<HashMap<ResourceId, Consumer>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, name: impl Into<String>, binding: DeliveryBinding, topics: &[String]) -> ResourceId {
        let mut consumer = Consumer::new(name, binding);
        for topic in topics {
            consumer.subscribe(topic.clone());
        }
        let id = consumer.id;
        self.consumers.write().unwrap().insert(id, consumer);
        id
    }

    pub fn deregister(&self, id: ResourceId) -> BrokerResult<()> {
        self.consumers
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BrokerError::ConsumerNotFound(id.to_string()))
    }

    pub fn get(&self, id: ResourceId) -> BrokerResult<Consumer> {
        self.consumers
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| BrokerError::ConsumerNotFound(id.to_string()))
    }

    /// Every consumer subscribed to `topic`, for the dispatcher to fan out to.
    pub fn subscribers_of(&self, topic: &str) -> Vec<Consumer> {
        self.consumers
            .read()
            .unwrap()
            .values()
            .filter(|c| c.topics.contains_key(topic))
            .cloned()
            .collect()
    }

    pub fn advance_cursor(&self, id: ResourceId, topic: &str, to: EventId) -> BrokerResult<()> {
        let mut consumers = self.consumers.write().unwrap();
        let consumer = consumers
            .get_mut(&id)
            .ok_or_else(|| BrokerError::ConsumerNotFound(id.to_string()))?;
        consumer.advance_cursor(topic, to);
        Ok(())
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Narrows a shared [`ConsumerRegistry`] to a single topic, matching the
/// per-topic view a [`crate::dispatcher::TopicDispatcher`] needs.
pub struct TopicView {
    registry: Arc<ConsumerRegistry>,
    topic: String,
}

impl TopicView {
    pub fn new(registry: Arc<ConsumerRegistry>, topic: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { registry, topic: topic.into() })
    }
}

impl DispatchTarget for TopicView {
    fn subscribers(&self) -> Vec<Consumer> {
        self.registry.subscribers_of(&self.topic)
    }

    fn advance_cursor(&self, consumer: ResourceId, to: EventId) {
        if let Err(e) = self.registry.advance_cursor(consumer, &self.topic, to) {
            tracing::warn!(consumer = %consumer, error = %e, "failed to advance cursor for evicted or unknown consumer");
        }
    }

    fn evict(&self, consumer: ResourceId, reason: &str) {
        tracing::warn!(consumer = %consumer, reason, topic = %self.topic, "evicting consumer");
        let _ = self.registry.deregister(consumer);
    }
}
