use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ResourceId;

/// A tenant in the management plane. The reserved `$system` tenant hosts the
/// `$management` namespace the bootstrap process seeds itself from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: ResourceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A namespace scoping topics within a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: ResourceId,
    pub tenant_id: ResourceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A principal that can be granted permissions and hold API keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: ResourceId,
    pub tenant_id: ResourceId,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A bearer credential belonging to a user, used by `AUTH_ENABLED` deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ResourceId,
    pub user_id: ResourceId,
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Management-plane event payloads, folded by Projections (C9) to rebuild
/// `Tenant`/`Namespace`/`User`/`ApiKey`/permission-grant state. Each variant
/// corresponds to one `event_type` string stored on one of the five
/// management topics (`tenants`, `namespaces`, `users`, `permissions`,
/// `api-keys` — spec.md §4.8); [`crate::management_event_topic`] maps a
/// variant to the topic it belongs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ManagementEvent {
    #[serde(rename = "tenant.created")]
    TenantCreated { id: ResourceId, name: String },
    #[serde(rename = "tenant.updated")]
    TenantUpdated { id: ResourceId, name: String },
    #[serde(rename = "tenant.deleted")]
    TenantDeleted { id: ResourceId },
    #[serde(rename = "namespace.created")]
    NamespaceCreated {
        id: ResourceId,
        tenant_id: ResourceId,
        name: String,
    },
    #[serde(rename = "namespace.updated")]
    NamespaceUpdated {
        id: ResourceId,
        tenant_id: ResourceId,
        name: String,
    },
    #[serde(rename = "namespace.deleted")]
    NamespaceDeleted { id: ResourceId },
    #[serde(rename = "user.created")]
    UserCreated {
        id: ResourceId,
        tenant_id: ResourceId,
        email: String,
        password_hash: String,
    },
    #[serde(rename = "user.updated")]
    UserUpdated { id: ResourceId, email: String },
    #[serde(rename = "user.password.changed")]
    UserPasswordChanged { id: ResourceId, password_hash: String },
    #[serde(rename = "user.tenant.assigned")]
    UserTenantAssigned { id: ResourceId, tenant_id: ResourceId },
    #[serde(rename = "user.tenant.removed")]
    UserTenantRemoved { id: ResourceId, tenant_id: ResourceId },
    #[serde(rename = "permission.granted")]
    PermissionGranted {
        principal_id: ResourceId,
        grant: crate::permission::PermissionGrant,
    },
    #[serde(rename = "permission.revoked")]
    PermissionRevoked {
        principal_id: ResourceId,
        grant_id: ResourceId,
    },
    #[serde(rename = "api-key.created")]
    ApiKeyCreated {
        id: ResourceId,
        user_id: ResourceId,
        key_hash: String,
    },
    #[serde(rename = "api-key.revoked")]
    ApiKeyRevoked { id: ResourceId },
}

/// Name of the management topic `event` belongs on (spec.md §4.8's
/// five-topic split: `tenants`, `namespaces`, `users`, `permissions`,
/// `api-keys`).
pub fn management_event_topic(event: &ManagementEvent) -> &'static str {
    match event {
        ManagementEvent::TenantCreated { .. } | ManagementEvent::TenantUpdated { .. } | ManagementEvent::TenantDeleted { .. } => {
            "tenants"
        }
        ManagementEvent::NamespaceCreated { .. } | ManagementEvent::NamespaceUpdated { .. } | ManagementEvent::NamespaceDeleted { .. } => {
            "namespaces"
        }
        ManagementEvent::UserCreated { .. }
        | ManagementEvent::UserUpdated { .. }
        | ManagementEvent::UserPasswordChanged { .. }
        | ManagementEvent::UserTenantAssigned { .. }
        | ManagementEvent::UserTenantRemoved { .. } => "users",
        ManagementEvent::PermissionGranted { .. } | ManagementEvent::PermissionRevoked { .. } => "permissions",
        ManagementEvent::ApiKeyCreated { .. } | ManagementEvent::ApiKeyRevoked { .. } => "api-keys",
    }
}
