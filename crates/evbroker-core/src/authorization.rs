use chrono::{DateTime, Utc};
use evbroker_types::{Permission, ResourceId, ResourceType};

use crate::projections::Projections;

/// Decide whether `principal` holds `permission` on `(resource_type,
/// resource_id)`, which lives under `tenant_id`.
///
/// `event_type`/`event_timestamp` give the request's event-level context, if
/// any — pass `None` for either when the check isn't about a specific event
/// (e.g. topic administration); a grant whose constraint narrows by
/// event-type or max-age will then only admit requests that supply the
/// matching context (spec.md §4.11 step 3).
///
/// A `Permission::Admin` grant directly on the tenant authorizes every
/// permission on every namespace and topic beneath it (spec.md §4.11); a
/// grant directly on the resource itself must otherwise match both its type
/// and id, or be a wildcard (`resource_id == None`) over that type. Expired
/// grants and grants whose constraint rejects the request never authorize.
#[allow(clippy::too_many_arguments)]
pub fn check_permission(
    projections: &Projections,
    principal: ResourceId,
    tenant_id: ResourceId,
    resource_type: ResourceType,
    resource_id: ResourceId,
    permission: Permission,
    event_type: Option<&str>,
    event_timestamp: Option<DateTime<Utc>>,
) -> bool {
    let now = Utc::now();
    projections.grants_for(principal).into_iter().any(|grant| {
        if grant.is_expired_at(now) {
            return false;
        }

        if !grant.constraint.admits(event_type, event_timestamp, now) {
            return false;
        }

        let tenant_admin_inherits =
            grant.resource_type == ResourceType::Tenant && grant.covers_resource(tenant_id) && grant.permission == Permission::Admin;

        let direct_match = grant.resource_type == resource_type
            && grant.covers_resource(resource_id)
            && (grant.permission == permission || grant.permission == Permission::Admin);

        tenant_admin_inherits || direct_match
    })
}
