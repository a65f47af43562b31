//! Core engine for the file-backed event broker: topic dispatching,
//! publication, and the event-sourced management plane layered on top of
//! `evbroker-store`, `evbroker-schema`, and `evbroker-webhook`.

pub mod authorization;
pub mod bootstrap;
pub mod config;
pub mod consumer_registry;
pub mod dispatcher;
pub mod dispatcher_manager;
pub mod management_stream;
pub mod projections;
pub mod publish;

pub use authorization::check_permission;
pub use bootstrap::{bootstrap, hash_password, verify_password};
pub use config::EngineConfig;
pub use consumer_registry::{ConsumerRegistry, TopicView};
pub use dispatcher::{DispatchTarget, TopicDispatcher};
pub use dispatcher_manager::DispatcherManager;
pub use projections::Projections;
pub use publish::PublishService;
