use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use evbroker_core::{bootstrap, check_permission, ConsumerRegistry, DispatcherManager, Projections, PublishService, TopicView};
use evbroker_schema::SchemaRegistry;
use evbroker_store::{EventStore, TopicStore};
use evbroker_types::{DeliveryBinding, DeliveryOutcome, EventDraft, Permission, ResourceId, ResourceType, Schema};
use evbroker_webhook::WebhookClient;
use tempfile::tempdir;

struct Harness {
    topic_store: Arc<TopicStore>,
    event_store: Arc<EventStore>,
    schemas: Arc<SchemaRegistry>,
    consumers: Arc<ConsumerRegistry>,
    dispatchers: Arc<DispatcherManager>,
    publish: PublishService,
}

fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let topic_store = Arc::new(TopicStore::new(dir.path()));
    let event_store = Arc::new(EventStore::new(dir.path()));
    let schemas = Arc::new(SchemaRegistry::new());
    let consumers = Arc::new(ConsumerRegistry::new());
    let dispatchers = Arc::new(DispatcherManager::new(event_store.clone(), Arc::new(WebhookClient::new().unwrap())));
    let publish = PublishService::new(topic_store.clone(), event_store.clone(), schemas.clone(), dispatchers.clone());

    // Keep the tempdir alive for the lifetime of the harness by leaking it —
    // scenario tests run within a single process and the OS reclaims the
    // directory on exit.
    std::mem::forget(dir);

    Harness { topic_store, event_store, schemas, consumers, dispatchers, publish }
}

/// A topic accepting a single event type publishes and is immediately
/// delivered to a fresh in-process consumer.
#[test]
fn scenario_publish_then_in_process_delivery() {
    let h = harness();
    h.topic_store
        .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    let consumer_id = h.consumers.register(
        "audit-log",
        DeliveryBinding::InProcess {
            handler: Arc::new(move |events| {
                received_clone.lock().unwrap().extend(events.iter().map(|e| e.sequence));
                DeliveryOutcome::Success
            }),
        },
        &["orders".to_string()],
    );

    let target = TopicView::new(h.consumers.clone(), "orders");
    h.dispatchers.ensure_dispatcher("acme", "prod", "orders", target);

    h.publish
        .publish(
            "acme",
            "prod",
            "orders",
            vec![EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"orderId": "o1"}) }],
        )
        .unwrap();

    wait_until(Duration::from_secs(2), || received.lock().unwrap().len() == 1);
    assert_eq!(*received.lock().unwrap(), vec![1]);

    let consumer = h.consumers.get(consumer_id).unwrap();
    assert_eq!(consumer.cursor("orders").unwrap().sequence, 1);

    h.dispatchers.shutdown_all();
}

/// A schema registered for an event type rejects non-conforming payloads
/// before anything is sequenced or stored.
#[test]
fn scenario_schema_governed_topic_rejects_bad_payload() {
    let h = harness();
    h.topic_store
        .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
        .unwrap();
    h.topic_store
        .update_schemas(
            "acme",
            "prod",
            "orders",
            vec![Schema {
                event_type: "order.created".to_string(),
                body: serde_json::json!({
                    "type": "object",
                    "required": ["orderId"],
                    "properties": { "orderId": { "type": "string" } }
                }),
            }],
        )
        .unwrap();

    let err = h
        .publish
        .publish(
            "acme",
            "prod",
            "orders",
            vec![EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"orderId": 5}) }],
        )
        .unwrap_err();
    assert!(matches!(err, evbroker_types::BrokerError::SchemaValidation { .. }));

    // Rejected batch never reached the store.
    assert!(h.event_store.get_events("acme", "prod", "orders", None, 10).unwrap().is_empty());
    h.dispatchers.shutdown_all();
}

/// A consumer that always fails is retried with exponential backoff and is
/// evicted once its attempts are exhausted, without ever losing track of
/// events delivered to other consumers of the same topic.
#[test]
fn scenario_failing_consumer_is_evicted_without_affecting_others() {
    let h = harness();
    h.topic_store
        .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
        .unwrap();

    let healthy_count = Arc::new(AtomicUsize::new(0));
    let healthy_count_clone = healthy_count.clone();
    h.consumers.register(
        "healthy",
        DeliveryBinding::InProcess {
            handler: Arc::new(move |events| {
                healthy_count_clone.fetch_add(events.len(), Ordering::SeqCst);
                DeliveryOutcome::Success
            }),
        },
        &["orders".to_string()],
    );

    let flaky_id = h.consumers.register(
        "flaky",
        DeliveryBinding::InProcess {
            handler: Arc::new(|_events| DeliveryOutcome::Failure("downstream unavailable".to_string())),
        },
        &["orders".to_string()],
    );

    let target = TopicView::new(h.consumers.clone(), "orders");
    h.dispatchers.ensure_dispatcher("acme", "prod", "orders", target);

    h.publish
        .publish(
            "acme",
            "prod",
            "orders",
            vec![EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({}) }],
        )
        .unwrap();

    wait_until(Duration::from_secs(2), || healthy_count.load(Ordering::SeqCst) == 1);
    assert_eq!(healthy_count.load(Ordering::SeqCst), 1);

    // The flaky consumer eventually gets evicted (removed from the registry).
    wait_until(Duration::from_secs(20), || h.consumers.get(flaky_id).is_err());
    assert!(h.consumers.get(flaky_id).is_err());

    h.dispatchers.shutdown_all();
}

/// A consumer's cursor advances to the last event of a successful delivery,
/// and a later publish only redelivers events newer than that cursor.
#[test]
fn scenario_cursor_advances_then_next_publish_delivers_only_new_events() {
    let h = harness();
    h.topic_store
        .create_topic("acme", "prod", "orders", ResourceId::new(), ResourceId::new())
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    h.consumers.register(
        "billing",
        DeliveryBinding::InProcess {
            handler: Arc::new(move |events| {
                received_clone.lock().unwrap().extend(events.iter().map(|e| e.sequence));
                DeliveryOutcome::Success
            }),
        },
        &["orders".to_string()],
    );

    let target = TopicView::new(h.consumers.clone(), "orders");
    h.dispatchers.ensure_dispatcher("acme", "prod", "orders", target);

    h.publish
        .publish(
            "acme",
            "prod",
            "orders",
            vec![
                EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"orderId": "o2"}) },
                EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"orderId": "o3"}) },
            ],
        )
        .unwrap();

    wait_until(Duration::from_secs(2), || received.lock().unwrap().len() == 2);
    assert_eq!(*received.lock().unwrap(), vec![1, 2]);

    h.publish
        .publish(
            "acme",
            "prod",
            "orders",
            vec![EventDraft { event_type: "order.created".to_string(), payload: serde_json::json!({"orderId": "o4"}) }],
        )
        .unwrap();

    wait_until(Duration::from_secs(2), || received.lock().unwrap().len() == 3);
    // The second dispatch pass redelivers only the newly published event,
    // never re-sending what the cursor already covers.
    assert_eq!(*received.lock().unwrap(), vec![1, 2, 3]);

    h.dispatchers.shutdown_all();
}

/// Bootstrapping the management plane seeds a tenant-admin grant for the
/// configured admin user, which `check_permission` then honors for any
/// topic created under that tenant.
#[test]
fn scenario_bootstrap_then_admin_can_manage_any_topic() {
    let h = harness();
    let projections = Projections::new();

    bootstrap::bootstrap(&h.topic_store, &h.publish, &projections, "admin@example.test", "correct horse battery staple").unwrap();

    let system_tenant = projections.tenant_by_name(evbroker_types::SYSTEM_TENANT).unwrap();
    let admin = projections
        .user_by_email(system_tenant.id, "admin@example.test")
        .unwrap();

    let some_topic = ResourceId::new();
    assert!(check_permission(
        &projections,
        admin.id,
        system_tenant.id,
        ResourceType::Topic,
        some_topic,
        Permission::ManageSchemas,
        None,
        None,
    ));

    let stranger = ResourceId::new();
    assert!(!check_permission(
        &projections,
        stranger,
        system_tenant.id,
        ResourceType::Topic,
        some_topic,
        Permission::Read,
        None,
        None,
    ));
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let start = std::time::Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("condition not met within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
