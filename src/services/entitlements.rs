// Plan entitlements derived from stored subscription rows.
// Evaluated per request, never cached.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

use crate::db::{Store, StoreResult};
use crate::models::{SubscriptionStatus, NO_SUBSCRIPTION_STATUS};

/// Review requests a Starter account may send per calendar month
pub const STARTER_MONTHLY_REVIEW_LIMIT: i64 = 5;

/// True iff any subscription for `uid` is active or trialing
pub async fn has_active_pro(store: &dyn Store, uid: &str) -> StoreResult<bool> {
    store
        .has_subscription_with_status(uid, &SubscriptionStatus::pro_status_strings())
        .await
}

/// Status of the most recently updated subscription, or `none`
pub async fn plan_status(store: &dyn Store, uid: &str) -> StoreResult<String> {
    Ok(store
        .latest_subscription(uid)
        .await?
        .map(|sub| sub.status)
        .unwrap_or_else(|| NO_SUBSCRIPTION_STATUS.to_string()))
}

/// Midnight UTC on the first day of `now`'s month
pub fn start_of_month_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Midnight UTC of `now`'s day
pub fn start_of_day_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewLimitStatus {
    pub pro: bool,
    pub used: i64,
    /// `None` means unlimited
    pub limit: Option<i64>,
}

impl ReviewLimitStatus {
    pub fn exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.used >= limit)
    }
}

/// Review requests sent this month across the businesses `uid` owns
pub async fn review_limit_status(
    store: &dyn Store,
    uid: &str,
    now: DateTime<Utc>,
) -> StoreResult<ReviewLimitStatus> {
    let pro = has_active_pro(store, uid).await?;

    let business_ids: Vec<_> = store
        .list_businesses_by_owner(uid)
        .await?
        .into_iter()
        .map(|b| b.id)
        .collect();

    let used = if business_ids.is_empty() {
        0
    } else {
        store
            .count_review_requests_since(&business_ids, start_of_month_utc(now))
            .await?
    };

    Ok(ReviewLimitStatus {
        pro,
        used,
        limit: if pro {
            None
        } else {
            Some(STARTER_MONTHLY_REVIEW_LIMIT)
        },
    })
}
