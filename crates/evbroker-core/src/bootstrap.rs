use std::sync::Arc;

use evbroker_types::{
    BrokerResult, EventDraft, ManagementEvent, Permission, PermissionConstraint, PermissionGrant,
    ResourceId, ResourceType,
};
use pbkdf2::pbkdf2_hmac_array;
use rand::RngCore;
use sha2::Sha256;

use crate::management_stream::{ALL_MANAGEMENT_TOPICS, MANAGEMENT_NAMESPACE, SYSTEM_TENANT};
use crate::projections::Projections;
use crate::publish::PublishService;
use evbroker_store::TopicStore;

const PBKDF2_ITERATIONS: u32 = 100_000;
const HASH_SIZE: usize = 32;
const SALT_SIZE: usize = 16;

/// Hash `password` with a random salt, returning `salt:hash` both hex-encoded.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    hash_password_with_salt(password, &salt)
}

fn hash_password_with_salt(password: &str, salt: &[u8]) -> String {
    let hash = pbkdf2_hmac_array::<Sha256, HASH_SIZE>(password.as_bytes(), salt, PBKDF2_ITERATIONS);
    format!("{}:{}", hex::encode(salt), hex::encode(hash))
}

/// Verify `password` against a `salt:hash` string produced by [`hash_password`].
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, _)) = stored.split_once(':') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    hash_password_with_salt(password, &salt) == stored
}

/// Idempotently seeds the `$system` tenant, its `$management` namespace and
/// topic, and a single admin user with full tenant-admin rights.
///
/// Safe to call on every startup: it is a no-op once the `$system` tenant
/// projection is already populated.
pub fn bootstrap(
    topic_store: &TopicStore,
    publish_service: &PublishService,
    projections: &Arc<Projections>,
    admin_email: &str,
    admin_password: &str,
) -> BrokerResult<()> {
    if projections.tenant_by_name(SYSTEM_TENANT).is_some() {
        tracing::debug!("management plane already bootstrapped");
        return Ok(());
    }

    for topic in ALL_MANAGEMENT_TOPICS {
        if !topic_store.topic_exists(SYSTEM_TENANT, MANAGEMENT_NAMESPACE, topic) {
            topic_store.create_topic(SYSTEM_TENANT, MANAGEMENT_NAMESPACE, topic, ResourceId::new(), ResourceId::new())?;
        }
    }

    let tenant_id = ResourceId::new();
    let namespace_id = ResourceId::new();
    let user_id = ResourceId::new();
    let password_hash = hash_password(admin_password);

    // ADMIN permission for TENANT scope with resourceId=null: "all
    // resources of this type" (spec.md S6), not just the `$system` tenant.
    let admin_grant = PermissionGrant {
        id: ResourceId::new(),
        resource_type: ResourceType::Tenant,
        resource_id: None,
        permission: Permission::Admin,
        constraint: PermissionConstraint::none(),
        granted_at: chrono::Utc::now(),
        expires_at: None,
    };

    let events = [
        ManagementEvent::TenantCreated { id: tenant_id, name: SYSTEM_TENANT.to_string() },
        ManagementEvent::NamespaceCreated { id: namespace_id, tenant_id, name: MANAGEMENT_NAMESPACE.to_string() },
        ManagementEvent::UserCreated {
            id: user_id,
            tenant_id,
            email: admin_email.to_string(),
            password_hash,
        },
        ManagementEvent::UserTenantAssigned { id: user_id, tenant_id },
        ManagementEvent::PermissionGranted { principal_id: user_id, grant: admin_grant },
    ];

    // Events land on five different topics (spec.md §4.8); group consecutive
    // events bound for the same topic so each publish call's sequencing
    // still reflects this batch's intended order.
    let mut stored = Vec::new();
    for (topic, chunk) in group_by_topic(events) {
        let drafts = chunk.into_iter().map(encode).collect();
        stored.extend(publish_service.publish(SYSTEM_TENANT, MANAGEMENT_NAMESPACE, topic, drafts)?);
    }

    // Fold immediately so a second bootstrap call in the same process sees
    // the `$system` tenant without waiting on the dispatcher's next pass.
    projections.handle(&stored);

    tracing::info!(admin_email, "bootstrapped management plane");
    Ok(())
}

/// Partition `events` into runs bound for the same management topic,
/// preserving their relative order.
fn group_by_topic<const N: usize>(events: [ManagementEvent; N]) -> Vec<(&'static str, Vec<ManagementEvent>)> {
    let mut groups: Vec<(&'static str, Vec<ManagementEvent>)> = Vec::new();
    for event in events {
        let topic = evbroker_types::management_event_topic(&event);
        match groups.last_mut() {
            Some((last_topic, batch)) if *last_topic == topic => batch.push(event),
            _ => groups.push((topic, vec![event])),
        }
    }
    groups
}

fn encode(event: ManagementEvent) -> EventDraft {
    let event_type = match &event {
        ManagementEvent::TenantCreated { .. } => "tenant.created",
        ManagementEvent::TenantUpdated { .. } => "tenant.updated",
        ManagementEvent::TenantDeleted { .. } => "tenant.deleted",
        ManagementEvent::NamespaceCreated { .. } => "namespace.created",
        ManagementEvent::NamespaceUpdated { .. } => "namespace.updated",
        ManagementEvent::NamespaceDeleted { .. } => "namespace.deleted",
        ManagementEvent::UserCreated { .. } => "user.created",
        ManagementEvent::UserUpdated { .. } => "user.updated",
        ManagementEvent::UserPasswordChanged { .. } => "user.password.changed",
        ManagementEvent::UserTenantAssigned { .. } => "user.tenant.assigned",
        ManagementEvent::UserTenantRemoved { .. } => "user.tenant.removed",
        ManagementEvent::ApiKeyCreated { .. } => "api-key.created",
        ManagementEvent::ApiKeyRevoked { .. } => "api-key.revoked",
        ManagementEvent::PermissionGranted { .. } => "permission.granted",
        ManagementEvent::PermissionRevoked { .. } => "permission.revoked",
    };
    let payload = serde_json::to_value(&event).expect("management events always serialize");
    EventDraft { event_type: event_type.to_string(), payload }
}
