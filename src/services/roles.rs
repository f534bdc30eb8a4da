// Business role resolution. Ownership always wins over a membership row.

use uuid::Uuid;

use crate::db::{Store, StoreResult};
use crate::models::Role;

/// Role of `uid` within `business_id`, or `None` without any access
pub async fn resolve_role(
    store: &dyn Store,
    uid: &str,
    business_id: Uuid,
) -> StoreResult<Option<Role>> {
    if let Some(business) = store.find_business(business_id).await? {
        if business.owner_uid == uid {
            return Ok(Some(Role::Owner));
        }
    }

    Ok(store
        .find_member(business_id, uid)
        .await?
        .and_then(|member| member.role()))
}

pub fn can_manage_members(role: Option<Role>) -> bool {
    matches!(role, Some(Role::Owner | Role::Admin))
}

/// Everyone with access except viewers may send review requests
pub fn can_send_review_requests(role: Option<Role>) -> bool {
    matches!(role, Some(Role::Owner | Role::Admin | Role::Member))
}
