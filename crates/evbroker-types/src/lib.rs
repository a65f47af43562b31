//! Shared domain types for the file-backed event broker engine.
//!
//! Every other crate in this workspace depends on this one for its vocabulary:
//! event and topic identity, the durable event/topic shapes, consumer
//! bindings, management-plane entities, permissions, and the error taxonomy.

pub mod consumer;
pub mod error;
pub mod event;
pub mod ids;
pub mod management;
pub mod permission;
pub mod topic;

pub use consumer::{Consumer, ConsumerBindingSpec, ConsumerRegistration, DeliveryBinding, DeliveryOutcome};
pub use error::{BrokerError, BrokerResult};
pub use event::{Event, EventDraft};
pub use ids::{
    EventId, ResourceId, DEFAULT_NAMESPACE, DEFAULT_TENANT, MANAGEMENT_NAMESPACE, SYSTEM_TENANT,
};
pub use management::{management_event_topic, ApiKey, ManagementEvent, Namespace, Tenant, User};
pub use permission::{Permission, PermissionConstraint, PermissionGrant, ResourceType};
pub use topic::{Schema, Topic};
