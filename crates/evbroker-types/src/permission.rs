use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ResourceId;

/// The kind of resource a permission grant targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Tenant,
    Namespace,
    Topic,
}

/// The action a grant authorizes against its target resource.
///
/// `Admin` on a tenant implies every other permission on every namespace and
/// topic beneath it (spec.md §4.11's inheritance clause).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Admin,
    Publish,
    Read,
    ManageConsumers,
    ManageSchemas,
}

/// Optional narrowing applied to a grant beyond its resource/permission pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PermissionConstraint {
    /// Restrict to a specific event type when the grant targets a topic.
    pub event_type: Option<String>,
    /// Events older than this are not covered by the grant.
    pub max_age_secs: Option<u64>,
}

impl PermissionConstraint {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.event_type.is_none() && self.max_age_secs.is_none()
    }

    /// Whether this constraint admits a request against `event_type` (when
    /// the grant is scoped to a topic) and, for age-limited grants, against
    /// an event timestamped `event_timestamp` (spec.md §4.11 step 3).
    ///
    /// A constraint that names an event-type filter or a max-age limit
    /// rejects requests that don't carry the corresponding context — a
    /// caller checking permission without naming the event type or
    /// timestamp it acts on cannot satisfy a narrowed grant.
    pub fn admits(&self, event_type: Option<&str>, event_timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if let Some(required_type) = &self.event_type {
            match event_type {
                Some(t) if t == required_type => {}
                _ => return false,
            }
        }

        if let Some(max_age_secs) = self.max_age_secs {
            match event_timestamp {
                Some(ts) => {
                    let age_secs = (now - ts).num_seconds();
                    if age_secs < 0 || age_secs as u64 > max_age_secs {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }
}

/// A grant of `permission` on `resource_id` (of `resource_type`) to a
/// principal, optionally narrowed by `constraint` and time-limited by
/// `expires_at`.
///
/// `resource_id == None` means "all resources of `resource_type` within the
/// declared scope" (spec.md §3 Management entities, §4.11 step 3) — e.g. a
/// tenant-scoped grant with `resource_id: None` authorizes every namespace
/// and topic under that tenant, not just one resource by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: ResourceId,
    pub resource_type: ResourceType,
    pub resource_id: Option<ResourceId>,
    pub permission: Permission,
    pub constraint: PermissionConstraint,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PermissionGrant {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Whether this grant's `resource_id` covers `target`: either it names
    /// `target` directly, or it is `None` (a wildcard over every resource of
    /// `resource_type` in scope).
    pub fn covers_resource(&self, target: ResourceId) -> bool {
        match self.resource_id {
            Some(id) => id == target,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(expires_at: Option<DateTime<Utc>>) -> PermissionGrant {
        PermissionGrant {
            id: ResourceId::new(),
            resource_type: ResourceType::Topic,
            resource_id: Some(ResourceId::new()),
            permission: Permission::Read,
            constraint: PermissionConstraint::none(),
            granted_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn null_resource_id_covers_every_resource_of_its_type() {
        let mut g = grant(None);
        g.resource_id = None;
        assert!(g.covers_resource(ResourceId::new()));
        assert!(g.covers_resource(ResourceId::new()));
    }

    #[test]
    fn specific_resource_id_covers_only_itself() {
        let target = ResourceId::new();
        let mut g = grant(None);
        g.resource_id = Some(target);
        assert!(g.covers_resource(target));
        assert!(!g.covers_resource(ResourceId::new()));
    }

    #[test]
    fn grant_without_expiry_never_expires() {
        assert!(!grant(None).is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn grant_is_expired_once_past_expiry() {
        let now = Utc::now();
        let g = grant(Some(now - Duration::seconds(1)));
        assert!(g.is_expired_at(now));
    }

    #[test]
    fn grant_is_not_yet_expired_before_expiry() {
        let now = Utc::now();
        let g = grant(Some(now + Duration::seconds(60)));
        assert!(!g.is_expired_at(now));
    }

    #[test]
    fn empty_constraint_reports_empty() {
        assert!(PermissionConstraint::none().is_empty());
        let c = PermissionConstraint {
            event_type: Some("order.created".to_string()),
            max_age_secs: None,
        };
        assert!(!c.is_empty());
    }

    #[test]
    fn empty_constraint_admits_anything() {
        let c = PermissionConstraint::none();
        assert!(c.admits(None, None, Utc::now()));
        assert!(c.admits(Some("order.created"), Some(Utc::now()), Utc::now()));
    }

    #[test]
    fn event_type_constraint_rejects_mismatched_or_missing_type() {
        let c = PermissionConstraint {
            event_type: Some("order.created".to_string()),
            max_age_secs: None,
        };
        assert!(c.admits(Some("order.created"), None, Utc::now()));
        assert!(!c.admits(Some("order.cancelled"), None, Utc::now()));
        assert!(!c.admits(None, None, Utc::now()));
    }

    #[test]
    fn max_age_constraint_rejects_stale_or_missing_timestamp() {
        let c = PermissionConstraint {
            event_type: None,
            max_age_secs: Some(60),
        };
        let now = Utc::now();
        assert!(c.admits(None, Some(now - Duration::seconds(30)), now));
        assert!(!c.admits(None, Some(now - Duration::seconds(90)), now));
        assert!(!c.admits(None, None, now));
    }
}
