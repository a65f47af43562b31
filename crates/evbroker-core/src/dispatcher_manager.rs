use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use evbroker_store::EventStore;
use evbroker_webhook::WebhookClient;

use crate::dispatcher::{DispatchTarget, TopicDispatcher};

/// Owns one [`TopicDispatcher`] per active topic and routes publish
/// notifications to the right one.
pub struct DispatcherManager {
    event_store: Arc<EventStore>,
    webhook: Arc<WebhookClient>,
    dispatchers: Mutex<HashMap<String, TopicDispatcher>>,
}

impl DispatcherManager {
    pub fn new(event_store: Arc<EventStore>, webhook: Arc<WebhookClient>) -> Self {
        Self {
            event_store,
            webhook,
            dispatchers: Mutex::new(HashMap::new()),
        }
    }

    fn key(tenant: &str, namespace: &str, topic: &str) -> String {
        format!("{tenant}/{namespace}/{topic}")
    }

    fn split_key(key: &str) -> (String, String, String) {
        let mut parts = key.splitn(3, '/');
        let tenant = parts.next().unwrap_or_default().to_string();
        let namespace = parts.next().unwrap_or_default().to_string();
        let topic = parts.next().unwrap_or_default().to_string();
        (tenant, namespace, topic)
    }

    /// Start the dispatch loop for `topic` if it isn't already running.
    /// Returns `true` if this call spawned it, `false` if one was already
    /// live (spec.md §4.6's `startDispatcher`).
    pub fn start_dispatcher(&self, tenant: &str, namespace: &str, topic: &str, target: Arc<dyn DispatchTarget>) -> bool {
        let key = Self::key(tenant, namespace, topic);
        let mut dispatchers = self.dispatchers.lock().unwrap();
        if dispatchers.contains_key(&key) {
            return false;
        }
        dispatchers.insert(
            key,
            TopicDispatcher::spawn(
                tenant.to_string(),
                namespace.to_string(),
                topic.to_string(),
                self.event_store.clone(),
                self.webhook.clone(),
                target,
            ),
        );
        true
    }

    /// Stop and remove the dispatch loop for `topic`, if one is running
    /// (spec.md §4.6's `stopDispatcher`).
    pub fn stop_dispatcher(&self, tenant: &str, namespace: &str, topic: &str) {
        let key = Self::key(tenant, namespace, topic);
        let dispatcher = self.dispatchers.lock().unwrap().remove(&key);
        if let Some(dispatcher) = dispatcher {
            dispatcher.shutdown();
        }
    }

    /// `(tenant, namespace, topic)` for every dispatcher currently live —
    /// backs the `/health` surface's dispatcher listing (SPEC_FULL §6).
    pub fn get_running_dispatchers(&self) -> Vec<(String, String, String)> {
        self.dispatchers.lock().unwrap().keys().map(|key| Self::split_key(key)).collect()
    }

    /// Ensure a dispatch loop is running for `topic`, spawning one the first
    /// time this topic is seen and immediately triggering one delivery pass
    /// so a newly-registered consumer doesn't wait for the next periodic
    /// tick to catch up (spec.md §4.6's `ensureDispatchersRunning`).
    pub fn ensure_dispatcher(&self, tenant: &str, namespace: &str, topic: &str, target: Arc<dyn DispatchTarget>) {
        if self.start_dispatcher(tenant, namespace, topic, target) {
            self.notify_events_published(tenant, namespace, topic);
        }
    }

    /// Best-effort wake-up of the dispatcher for `topic`. A topic with no
    /// dispatcher yet (nobody has subscribed) is silently ignored — the
    /// periodic tick of a dispatcher spawned later will pick up any events
    /// already stored.
    pub fn notify_events_published(&self, tenant: &str, namespace: &str, topic: &str) {
        let key = Self::key(tenant, namespace, topic);
        if let Some(dispatcher) = self.dispatchers.lock().unwrap().get(&key) {
            dispatcher.notify();
        }
    }

    pub fn stop_all_dispatchers(&self) {
        let mut dispatchers = self.dispatchers.lock().unwrap();
        for (_, dispatcher) in dispatchers.drain() {
            dispatcher.shutdown();
        }
    }

    /// Alias for [`Self::stop_all_dispatchers`] kept for existing call sites.
    pub fn shutdown_all(&self) {
        self.stop_all_dispatchers();
    }
}
