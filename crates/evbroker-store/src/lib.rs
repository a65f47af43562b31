//! Durable file-backed storage for the event broker: topic configuration
//! (sequence cursor, schemas) and individual events, both written through an
//! atomic temp-file-then-rename protocol so a crash never leaves a partial
//! file visible under its final name.

mod atomic;
mod event_store;
mod topic_store;

pub use event_store::{batch_timestamp, EventStore};
pub use topic_store::TopicStore;
