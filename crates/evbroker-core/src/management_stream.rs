//! Well-known identifiers for the event-sourced management plane.
//!
//! The `$system` tenant hosts a single `$management` namespace with five
//! topics — `tenants`, `namespaces`, `users`, `permissions`, `api-keys`
//! (spec.md §4.8) — each carrying its own slice of
//! [`evbroker_types::ManagementEvent`] variants, folded by
//! [`crate::projections::Projections`].

pub use evbroker_types::{MANAGEMENT_NAMESPACE, SYSTEM_TENANT};

/// Tenant lifecycle events: `tenant.created`, `tenant.updated`, `tenant.deleted`.
pub const TENANTS_TOPIC: &str = "tenants";
/// Namespace lifecycle events: `namespace.created`, `namespace.updated`, `namespace.deleted`.
pub const NAMESPACES_TOPIC: &str = "namespaces";
/// User lifecycle events: `user.created`, `user.updated`, `user.password.changed`,
/// `user.tenant.assigned`, `user.tenant.removed`.
pub const USERS_TOPIC: &str = "users";
/// Permission events: `permission.granted`, `permission.revoked`.
pub const PERMISSIONS_TOPIC: &str = "permissions";
/// API key events: `api-key.created`, `api-key.revoked`.
pub const API_KEYS_TOPIC: &str = "api-keys";

/// Every management topic the bootstrap process must ensure exists, in the
/// order spec.md §4.8 lists them.
pub const ALL_MANAGEMENT_TOPICS: [&str; 5] = [TENANTS_TOPIC, NAMESPACES_TOPIC, USERS_TOPIC, PERMISSIONS_TOPIC, API_KEYS_TOPIC];

/// Consumer name the bootstrap process registers the projections folder
/// under, so it's recognizable in diagnostics and never collides with a
/// caller-registered consumer.
pub const PROJECTIONS_CONSUMER_NAME: &str = "$projections";
