use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use evbroker_types::{
    ApiKey, DeliveryBinding, DeliveryOutcome, Event, ManagementEvent, Namespace, PermissionGrant,
    ResourceId, Tenant, User,
};

/// Cache key for a principal's resolved grants, scoped to the narrowest
/// resource the caller asked about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GrantCacheKey {
    principal: ResourceId,
}

/// Rebuilds tenant/namespace/user/API-key/permission-grant state by folding
/// management events in order.
///
/// This is registered as an in-process consumer of each of the five
/// management topics (`tenants`, `namespaces`, `users`, `permissions`,
/// `api-keys` — spec.md §4.8/§4.9): the dispatcher calls
/// [`Projections::handle`] with every newly-published batch, in sequence
/// order, exactly once per event.
pub struct Projections {
    tenants: RwLock<HashMap<ResourceId, Tenant>>,
    namespaces: RwLock<HashMap<ResourceId, Namespace>>,
    users: RwLock<HashMap<ResourceId, User>>,
    api_keys: RwLock<HashMap<ResourceId, ApiKey>>,
    grants: RwLock<HashMap<ResourceId, Vec<PermissionGrant>>>,
    grant_cache: Mutex<HashMap<GrantCacheKey, Vec<PermissionGrant>>>,
}

impl Projections {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tenants: RwLock::new(HashMap::new()),
            namespaces: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            api_keys: RwLock::new(HashMap::new()),
            grants: RwLock::new(HashMap::new()),
            grant_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Wraps this projections instance as the `InProcess` delivery binding a
    /// `ConsumerRegistry` registration expects.
    pub fn as_delivery_binding(self: &Arc<Self>) -> DeliveryBinding {
        let projections = self.clone();
        DeliveryBinding::InProcess {
            handler: Arc::new(move |events: &[Event]| projections.handle(events)),
        }
    }

    /// Fold a batch of already-stored events directly, bypassing the
    /// dispatcher — used by bootstrap to make its own writes immediately
    /// visible without waiting on a dispatch cycle.
    pub(crate) fn handle(&self, events: &[Event]) -> DeliveryOutcome {
        for event in events {
            match Self::decode(event) {
                Ok(management_event) => self.fold(management_event),
                Err(e) => {
                    tracing::error!(event_id = %event.id, error = %e, "undecodable management event, evicting consumer");
                    return DeliveryOutcome::Failure(format!("undecodable management event: {e}"));
                }
            }
        }
        DeliveryOutcome::Success
    }

    fn decode(event: &Event) -> Result<ManagementEvent, serde_json::Error> {
        let mut tagged = event.payload.clone();
        if let serde_json::Value::Object(ref mut map) = tagged {
            map.insert("event_type".to_string(), serde_json::Value::String(event.event_type.clone()));
        }
        serde_json::from_value(tagged)
    }

    fn fold(&self, event: ManagementEvent) {
        match event {
            ManagementEvent::TenantCreated { id, name } | ManagementEvent::TenantUpdated { id, name } => {
                self.tenants
                    .write()
                    .unwrap()
                    .entry(id)
                    .and_modify(|t| t.name = name.clone())
                    .or_insert_with(|| Tenant { id, name, created_at: chrono::Utc::now() });
            }
            ManagementEvent::TenantDeleted { id } => {
                self.tenants.write().unwrap().remove(&id);
            }
            ManagementEvent::NamespaceCreated { id, tenant_id, name } | ManagementEvent::NamespaceUpdated { id, tenant_id, name } => {
                self.namespaces
                    .write()
                    .unwrap()
                    .entry(id)
                    .and_modify(|n| n.name = name.clone())
                    .or_insert_with(|| Namespace { id, tenant_id, name, created_at: chrono::Utc::now() });
            }
            ManagementEvent::NamespaceDeleted { id } => {
                self.namespaces.write().unwrap().remove(&id);
            }
            ManagementEvent::UserCreated { id, tenant_id, email, password_hash } => {
                self.users.write().unwrap().insert(
                    id,
                    User { id, tenant_id, email, password_hash, created_at: chrono::Utc::now() },
                );
            }
            ManagementEvent::UserUpdated { id, email } => {
                if let Some(user) = self.users.write().unwrap().get_mut(&id) {
                    user.email = email;
                }
            }
            ManagementEvent::UserPasswordChanged { id, password_hash } => {
                if let Some(user) = self.users.write().unwrap().get_mut(&id) {
                    user.password_hash = password_hash;
                }
            }
            ManagementEvent::UserTenantAssigned { id, tenant_id } => {
                if let Some(user) = self.users.write().unwrap().get_mut(&id) {
                    user.tenant_id = tenant_id;
                }
            }
            ManagementEvent::UserTenantRemoved { .. } => {
                // User only tracks a single primary tenant_id; removal is
                // retained in the event stream for audit but the projection
                // has no secondary membership to drop.
            }
            ManagementEvent::ApiKeyCreated { id, user_id, key_hash } => {
                self.api_keys.write().unwrap().insert(
                    id,
                    ApiKey { id, user_id, key_hash, created_at: chrono::Utc::now(), revoked_at: None },
                );
            }
            ManagementEvent::ApiKeyRevoked { id } => {
                if let Some(key) = self.api_keys.write().unwrap().get_mut(&id) {
                    key.revoked_at = Some(chrono::Utc::now());
                }
            }
            ManagementEvent::PermissionGranted { principal_id, grant } => {
                self.grants.write().unwrap().entry(principal_id).or_default().push(grant);
                self.invalidate_cache(principal_id);
            }
            ManagementEvent::PermissionRevoked { principal_id, grant_id } => {
                if let Some(grants) = self.grants.write().unwrap().get_mut(&principal_id) {
                    grants.retain(|g| g.id != grant_id);
                }
                self.invalidate_cache(principal_id);
            }
        }
    }

    fn invalidate_cache(&self, principal: ResourceId) {
        self.grant_cache.lock().unwrap().remove(&GrantCacheKey { principal });
    }

    /// Active (non-revoked-at-fold-time) grants held by `principal`, served
    /// from cache when available.
    pub fn grants_for(&self, principal: ResourceId) -> Vec<PermissionGrant> {
        let key = GrantCacheKey { principal };
        if let Some(cached) = self.grant_cache.lock().unwrap().get(&key) {
            return cached.clone();
        }
        let grants = self.grants.read().unwrap().get(&principal).cloned().unwrap_or_default();
        self.grant_cache.lock().unwrap().insert(key, grants.clone());
        grants
    }

    pub fn tenant(&self, id: ResourceId) -> Option<Tenant> {
        self.tenants.read().unwrap().get(&id).cloned()
    }

    pub fn tenant_by_name(&self, name: &str) -> Option<Tenant> {
        self.tenants.read().unwrap().values().find(|t| t.name == name).cloned()
    }

    pub fn namespace(&self, id: ResourceId) -> Option<Namespace> {
        self.namespaces.read().unwrap().get(&id).cloned()
    }

    pub fn user_by_email(&self, tenant_id: ResourceId, email: &str) -> Option<User> {
        self.users
            .read()
            .unwrap()
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email == email)
            .cloned()
    }

    pub fn api_key(&self, id: ResourceId) -> Option<ApiKey> {
        self.api_keys.read().unwrap().get(&id).cloned()
    }

    pub fn api_key_by_hash(&self, key_hash: &str) -> Option<ApiKey> {
        self.api_keys
            .read()
            .unwrap()
            .values()
            .find(|k| k.key_hash == key_hash && k.is_active())
            .cloned()
    }
}
