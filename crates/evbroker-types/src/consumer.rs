use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::ids::{EventId, ResourceId};

/// How a dispatcher hands events to a consumer.
///
/// `InProcess` is not serializable — it only exists for projections (C9)
/// registered directly by the engine, never for a caller-registered consumer.
#[derive(Clone)]
pub enum DeliveryBinding {
    Http {
        url: String,
    },
    AzureEventGrid {
        endpoint: String,
        key: String,
    },
    InProcess {
        handler: Arc<dyn Fn(&[Event]) -> DeliveryOutcome + Send + Sync>,
    },
}

impl fmt::Debug for DeliveryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryBinding::Http { url } => f.debug_struct("Http").field("url", url).finish(),
            DeliveryBinding::AzureEventGrid { endpoint, .. } => f
                .debug_struct("AzureEventGrid")
                .field("endpoint", endpoint)
                .finish(),
            DeliveryBinding::InProcess { .. } => f.debug_struct("InProcess").finish(),
        }
    }
}

/// Result of one delivery attempt against a consumer's binding.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Success,
    Failure(String),
}

/// A registered consumer: its binding, and the per-topic delivery cursor.
#[derive(Debug, Clone)]
pub struct Consumer {
    pub id: ResourceId,
    pub name: String,
    pub binding: DeliveryBinding,
    /// Topic name -> last successfully delivered event id (None = nothing
    /// delivered yet).
    pub topics: BTreeMap<String, Option<EventId>>,
}

impl Consumer {
    pub fn new(name: impl Into<String>, binding: DeliveryBinding) -> Self {
        Self {
            id: ResourceId::new(),
            name: name.into(),
            binding,
            topics: BTreeMap::new(),
        }
    }

    pub fn subscribe(&mut self, topic: impl Into<String>) {
        self.topics.entry(topic.into()).or_insert(None);
    }

    pub fn cursor(&self, topic: &str) -> Option<&EventId> {
        self.topics.get(topic).and_then(|c| c.as_ref())
    }

    pub fn advance_cursor(&mut self, topic: &str, to: EventId) {
        self.topics.insert(topic.to_string(), Some(to));
    }
}

/// On-disk representation of a caller-registered consumer (no `InProcess`
/// variant reaches this, since projections are registered in-memory only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerRegistration {
    pub name: String,
    pub binding: ConsumerBindingSpec,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumerBindingSpec {
    Http { url: String },
    AzureEventGrid { endpoint: String, key: String },
}

impl From<ConsumerBindingSpec> for DeliveryBinding {
    fn from(spec: ConsumerBindingSpec) -> Self {
        match spec {
            ConsumerBindingSpec::Http { url } => DeliveryBinding::Http { url },
            ConsumerBindingSpec::AzureEventGrid { endpoint, key } => {
                DeliveryBinding::AzureEventGrid { endpoint, key }
            }
        }
    }
}
