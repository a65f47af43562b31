use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use evbroker_retry::{calculate_delay, is_exhausted, RetryPolicy, RetryStrategyConfig};
use evbroker_store::EventStore;
use evbroker_types::{Consumer, DeliveryBinding, DeliveryOutcome, Event, ResourceId};
use evbroker_webhook::WebhookClient;

/// Default interval a dispatcher wakes on even without a publish trigger, so
/// a late-arriving consumer registration still gets picked up promptly.
const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Per-consumer backoff bookkeeping, held only in memory: a dispatcher
/// restart resets retry counters, which is acceptable because a restart
/// also re-reads the consumer's durable cursor and simply resumes from
/// there with a fresh attempt budget.
struct RetryState {
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
}

/// One background dispatch loop for a single topic.
///
/// Wakes either on a bounded trigger (at most one pending wake-up is ever
/// queued — a burst of publishes collapses into a single dispatch pass) or
/// on the periodic tick, fans out pending events to every subscribed
/// consumer, and advances each consumer's cursor only after a successful
/// delivery.
pub struct TopicDispatcher {
    trigger: SyncSender<()>,
    handle: Option<JoinHandle<()>>,
}

/// Callbacks the dispatcher loop needs from the rest of the engine; kept as
/// a trait so `evbroker-core`'s consumer registry and its tests can each
/// supply their own view without this module depending on their types
/// directly.
pub trait DispatchTarget: Send + Sync + 'static {
    fn subscribers(&self) -> Vec<Consumer>;
    fn advance_cursor(&self, consumer: ResourceId, to: evbroker_types::EventId);
    fn evict(&self, consumer: ResourceId, reason: &str);
}

impl TopicDispatcher {
    pub fn spawn(
        tenant: String,
        namespace: String,
        topic: String,
        event_store: Arc<EventStore>,
        webhook: Arc<WebhookClient>,
        target: Arc<dyn DispatchTarget>,
    ) -> Self {
        Self::spawn_with_policy(
            tenant,
            namespace,
            topic,
            event_store,
            webhook,
            target,
            RetryPolicy::Dispatcher.to_config(),
        )
    }

    pub fn spawn_with_policy(
        tenant: String,
        namespace: String,
        topic: String,
        event_store: Arc<EventStore>,
        webhook: Arc<WebhookClient>,
        target: Arc<dyn DispatchTarget>,
        retry_config: RetryStrategyConfig,
    ) -> Self {
        let (trigger, rx) = mpsc::sync_channel::<()>(1);

        let handle = thread::spawn(move || {
            let mut retries: HashMap<ResourceId, RetryState> = HashMap::new();

            loop {
                match rx.recv_timeout(DEFAULT_TICK) {
                    Ok(()) | Err(RecvTimeoutError::Timeout) => {
                        dispatch_once(&tenant, &namespace, &topic, &event_store, &webhook, target.as_ref(), &mut retries, &retry_config);
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self {
            trigger,
            handle: Some(handle),
        }
    }

    /// Best-effort wake-up; never blocks the publish path. A wake-up that
    /// can't be queued (one is already pending) is simply dropped — the
    /// dispatcher will pick up the new events on that pending pass anyway.
    pub fn notify(&self) {
        let _ = self.trigger.try_send(());
    }

    pub fn shutdown(mut self) {
        let handle = self.handle.take();
        drop(self);
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for TopicDispatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_once(
    tenant: &str,
    namespace: &str,
    topic: &str,
    event_store: &EventStore,
    webhook: &WebhookClient,
    target: &dyn DispatchTarget,
    retries: &mut HashMap<ResourceId, RetryState>,
    retry_config: &RetryStrategyConfig,
) {
    let now = Utc::now();

    for consumer in target.subscribers() {
        if let Some(state) = retries.get(&consumer.id) {
            if state.next_attempt_at > now {
                continue;
            }
        }

        let after = consumer.cursor(topic).map(|id| id.sequence);
        let events = match event_store.get_events(tenant, namespace, topic, after, 100) {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(topic, consumer = %consumer.id, error = %e, "failed to read pending events");
                continue;
            }
        };

        if events.is_empty() {
            continue;
        }

        match deliver(&consumer, &events, webhook) {
            DeliveryOutcome::Success => {
                retries.remove(&consumer.id);
                let last = events.last().expect("non-empty").id.clone();
                target.advance_cursor(consumer.id, last);
                tracing::debug!(topic, consumer = %consumer.id, delivered = events.len(), "delivery succeeded");
            }
            DeliveryOutcome::Failure(reason) => {
                let attempts = retries.get(&consumer.id).map(|s| s.attempts).unwrap_or(0) + 1;
                if is_exhausted(retry_config, attempts) {
                    tracing::error!(topic, consumer = %consumer.id, attempts, reason, "consumer evicted after exhausting retries");
                    retries.remove(&consumer.id);
                    target.evict(consumer.id, &reason);
                } else {
                    let delay = calculate_delay(retry_config, attempts);
                    tracing::warn!(topic, consumer = %consumer.id, attempts, ?delay, reason, "delivery failed, retrying");
                    retries.insert(
                        consumer.id,
                        RetryState {
                            attempts,
                            next_attempt_at: now + chrono::Duration::from_std(delay).unwrap_or_default(),
                        },
                    );
                }
            }
        }
    }
}

fn deliver(consumer: &Consumer, events: &[Event], webhook: &WebhookClient) -> DeliveryOutcome {
    match &consumer.binding {
        DeliveryBinding::Http { url } => match webhook.deliver(url, &consumer.id.to_string(), events) {
            Ok(()) => DeliveryOutcome::Success,
            Err(reason) => DeliveryOutcome::Failure(reason),
        },
        DeliveryBinding::AzureEventGrid { endpoint, key } => {
            match webhook.deliver_with_header(endpoint, "aeg-sas-key", key, &consumer.id.to_string(), events) {
                Ok(()) => DeliveryOutcome::Success,
                Err(reason) => DeliveryOutcome::Failure(reason),
            }
        }
        DeliveryBinding::InProcess { handler } => handler(events),
    }
}
