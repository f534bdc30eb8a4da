use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::{stripe_customers, subscriptions};

/// Local mirror of a Stripe subscription, keyed by the Stripe id
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = subscriptions)]
#[diesel(primary_key(stripe_subscription_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub stripe_subscription_id: String,
    pub uid: String,
    pub plan_id: Option<String>,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = subscriptions)]
#[diesel(treat_none_as_null = true)]
pub struct SubscriptionUpsert {
    pub stripe_subscription_id: String,
    pub uid: String,
    pub plan_id: Option<String>,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Known provider statuses. Stored as the provider's raw string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl SubscriptionStatus {
    /// Statuses that grant Pro entitlements
    pub const PRO: [SubscriptionStatus; 2] = [SubscriptionStatus::Active, SubscriptionStatus::Trialing];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Paused => "paused",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" | "cancelled" => Some(SubscriptionStatus::Canceled),
            "unpaid" => Some(SubscriptionStatus::Unpaid),
            "incomplete" => Some(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Some(SubscriptionStatus::IncompleteExpired),
            "paused" => Some(SubscriptionStatus::Paused),
            _ => None,
        }
    }

    pub fn pro_status_strings() -> Vec<&'static str> {
        Self::PRO.iter().map(|s| s.as_str()).collect()
    }

    pub fn grants_pro(status: &str) -> bool {
        Self::PRO.iter().any(|s| s.as_str() == status)
    }
}

/// Status reported when a user has no subscription row
pub const NO_SUBSCRIPTION_STATUS: &str = "none";

impl Subscription {
    pub async fn exists_with_status(
        conn: &mut AsyncPgConnection,
        for_uid: &str,
        statuses: &[&str],
    ) -> QueryResult<bool> {
        diesel::select(diesel::dsl::exists(
            subscriptions::table
                .filter(subscriptions::uid.eq(for_uid))
                .filter(subscriptions::status.eq_any(statuses)),
        ))
        .get_result(conn)
        .await
    }

    pub async fn latest_for_uid(
        conn: &mut AsyncPgConnection,
        for_uid: &str,
    ) -> QueryResult<Option<Subscription>> {
        subscriptions::table
            .filter(subscriptions::uid.eq(for_uid))
            .order(subscriptions::updated_at.desc())
            .select(Subscription::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        row: &SubscriptionUpsert,
    ) -> QueryResult<Subscription> {
        diesel::insert_into(subscriptions::table)
            .values(row)
            .on_conflict(subscriptions::stripe_subscription_id)
            .do_update()
            .set(row)
            .returning(Subscription::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        status_filter: Option<&str>,
        limit: i64,
    ) -> QueryResult<Vec<Subscription>> {
        let mut query = subscriptions::table
            .order(subscriptions::updated_at.desc())
            .limit(limit)
            .select(Subscription::as_select())
            .into_boxed();

        if let Some(status) = status_filter {
            query = query.filter(subscriptions::status.eq(status.to_string()));
        }

        query.load(conn).await
    }
}

/// Payer uid to Stripe customer id mapping
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = stripe_customers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StripeCustomer {
    pub uid: String,
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
}

impl StripeCustomer {
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        for_uid: &str,
        customer: &str,
    ) -> QueryResult<usize> {
        diesel::insert_into(stripe_customers::table)
            .values((
                stripe_customers::uid.eq(for_uid),
                stripe_customers::customer_id.eq(customer),
            ))
            .on_conflict(stripe_customers::uid)
            .do_update()
            .set(stripe_customers::customer_id.eq(customer))
            .execute(conn)
            .await
    }

    pub async fn find_uid_by_customer(
        conn: &mut AsyncPgConnection,
        customer: &str,
    ) -> QueryResult<Option<String>> {
        stripe_customers::table
            .filter(stripe_customers::customer_id.eq(customer))
            .select(stripe_customers::uid)
            .first(conn)
            .await
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pro_statuses() {
        assert!(SubscriptionStatus::grants_pro("active"));
        assert!(SubscriptionStatus::grants_pro("trialing"));
        assert!(!SubscriptionStatus::grants_pro("past_due"));
        assert!(!SubscriptionStatus::grants_pro("canceled"));
        assert!(!SubscriptionStatus::grants_pro(NO_SUBSCRIPTION_STATUS));
    }

    #[test]
    fn test_status_round_trip_names() {
        assert_eq!(
            SubscriptionStatus::from_string("incomplete_expired"),
            Some(SubscriptionStatus::IncompleteExpired)
        );
        assert_eq!(SubscriptionStatus::from_string("bogus"), None);
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
    }
}
