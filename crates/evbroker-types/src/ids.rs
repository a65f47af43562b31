use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BrokerError;

/// Stable GUID for a management entity (tenant, namespace, topic, ...).
///
/// Renaming the human-readable name a resource is known by never invalidates
/// a permission grant, because grants reference the `ResourceId`, not the
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// `$system` tenant / `$management` namespace literals (spec.md §4.8).
pub const SYSTEM_TENANT: &str = "$system";
pub const MANAGEMENT_NAMESPACE: &str = "$management";

/// Default single-tenant identifiers used when multi-tenancy is disabled.
pub const DEFAULT_TENANT: &str = "default";
pub const DEFAULT_NAMESPACE: &str = "default";

/// A parsed event identifier, either in canonical `<topic>-<sequence>` form
/// or tenant-scoped `<tenant>/<namespace>/<topic>-<sequence>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId {
    pub tenant: Option<String>,
    pub namespace: Option<String>,
    pub topic: String,
    pub sequence: u64,
}

impl EventId {
    pub fn canonical(topic: impl Into<String>, sequence: u64) -> Self {
        Self {
            tenant: None,
            namespace: None,
            topic: topic.into(),
            sequence,
        }
    }

    pub fn tenant_scoped(
        tenant: impl Into<String>,
        namespace: impl Into<String>,
        topic: impl Into<String>,
        sequence: u64,
    ) -> Self {
        Self {
            tenant: Some(tenant.into()),
            namespace: Some(namespace.into()),
            topic: topic.into(),
            sequence,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.tenant, &self.namespace) {
            (Some(tenant), Some(namespace)) => {
                write!(f, "{}/{}/{}-{}", tenant, namespace, self.topic, self.sequence)
            }
            _ => write!(f, "{}-{}", self.topic, self.sequence),
        }
    }
}

impl FromStr for EventId {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BrokerError::InvalidRequest(format!("malformed event id: {s}"));

        let (scope, topic_seq) = match s.rsplit_once('/') {
            Some((scope, rest)) => (Some(scope), rest),
            None => (None, s),
        };

        let (topic, seq_str) = topic_seq.rsplit_once('-').ok_or_else(invalid)?;
        if topic.is_empty() || seq_str.is_empty() {
            return Err(invalid());
        }
        let sequence: u64 = seq_str.parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }

        match scope {
            Some(scope) => {
                let mut parts = scope.splitn(2, '/');
                let tenant = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
                let namespace = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
                Ok(Self::tenant_scoped(tenant, namespace, topic, sequence))
            }
            None => Ok(Self::canonical(topic, sequence)),
        }
    }
}

impl Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trips() {
        let id = EventId::canonical("orders", 42);
        let s = id.to_string();
        assert_eq!(s, "orders-42");
        let parsed: EventId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn tenant_scoped_round_trips() {
        let id = EventId::tenant_scoped("acme", "prod", "orders", 7);
        let s = id.to_string();
        assert_eq!(s, "acme/prod/orders-7");
        let parsed: EventId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_zero_sequence() {
        assert!("orders-0".parse::<EventId>().is_err());
    }

    #[test]
    fn rejects_missing_sequence() {
        assert!("orders-".parse::<EventId>().is_err());
        assert!("orders".parse::<EventId>().is_err());
    }

    #[test]
    fn rejects_malformed_tenant_scope() {
        assert!("acme/orders-1".parse::<EventId>().is_err());
    }

    #[test]
    fn topic_name_may_contain_hyphens() {
        let id = EventId::canonical("order-events", 3);
        let s = id.to_string();
        let parsed: EventId = s.parse().unwrap();
        assert_eq!(parsed.topic, "order-events");
        assert_eq!(parsed.sequence, 3);
    }

    proptest::proptest! {
        #[test]
        fn canonical_form_round_trips_for_any_topic_and_sequence(
            topic in "[a-z][a-z0-9]{0,12}",
            sequence in 1u64..1_000_000,
        ) {
            let id = EventId::canonical(topic, sequence);
            let parsed: EventId = id.to_string().parse().unwrap();
            proptest::prop_assert_eq!(parsed, id);
        }
    }
}
