// Storage seam
//
// Every handler and service reaches the relational store through `Store`.
// `PgStore` is the production implementation; `MemoryStore` backs local
// development and the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Business, BusinessMember, BusinessUpsert, EmailLogEntry, MemberInvite, NewEmailLogEntry,
    NewMemberInvite, NewReviewRequest, NewUser, NewWebhookEvent, ReviewRequest, Role, ShortClick,
    ShortLink, Subscription, SubscriptionUpsert, User,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for health output
    fn backend_name(&self) -> &'static str;

    // Users
    async fn upsert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, uid: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>>;

    // Businesses
    async fn find_business_by_owner(&self, owner_uid: &str) -> StoreResult<Option<Business>>;
    async fn find_business(&self, id: Uuid) -> StoreResult<Option<Business>>;
    async fn upsert_business(&self, row: BusinessUpsert) -> StoreResult<Business>;
    async fn list_businesses_by_owner(&self, owner_uid: &str) -> StoreResult<Vec<Business>>;
    async fn list_businesses(&self) -> StoreResult<Vec<Business>>;
    async fn count_businesses_created_since(&self, since: DateTime<Utc>) -> StoreResult<i64>;

    // Subscriptions
    async fn has_subscription_with_status(&self, uid: &str, statuses: &[&str])
        -> StoreResult<bool>;
    async fn latest_subscription(&self, uid: &str) -> StoreResult<Option<Subscription>>;
    async fn upsert_subscription(&self, row: SubscriptionUpsert) -> StoreResult<Subscription>;
    async fn list_subscriptions(
        &self,
        status: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<Subscription>>;
    async fn upsert_stripe_customer(&self, uid: &str, customer_id: &str) -> StoreResult<()>;
    async fn find_uid_by_customer(&self, customer_id: &str) -> StoreResult<Option<String>>;

    // Webhook dedup
    /// Insert-or-skip keyed by event id. True when newly recorded.
    async fn record_webhook_event(&self, event: NewWebhookEvent) -> StoreResult<bool>;
    async fn delete_webhook_event(&self, id: &str) -> StoreResult<()>;

    // Members and invites
    async fn find_member(&self, business_id: Uuid, uid: &str)
        -> StoreResult<Option<BusinessMember>>;
    async fn list_members(&self, business_id: Uuid) -> StoreResult<Vec<BusinessMember>>;
    async fn upsert_member(&self, business_id: Uuid, uid: &str, role: Role) -> StoreResult<()>;
    async fn remove_member(&self, business_id: Uuid, uid: &str) -> StoreResult<bool>;
    async fn insert_invite(&self, invite: NewMemberInvite) -> StoreResult<MemberInvite>;
    async fn find_invite(&self, token: &str) -> StoreResult<Option<MemberInvite>>;
    /// Marks an unused invite accepted. False when already used or unknown.
    async fn mark_invite_accepted(&self, token: &str, uid: &str) -> StoreResult<bool>;
    async fn list_invites(&self, business_id: Uuid) -> StoreResult<Vec<MemberInvite>>;

    // Short links and clicks
    async fn insert_short_link(&self, link: ShortLink) -> StoreResult<ShortLink>;
    async fn find_short_link(&self, slug: &str) -> StoreResult<Option<ShortLink>>;
    async fn list_short_links_for_businesses(&self, ids: &[Uuid]) -> StoreResult<Vec<ShortLink>>;
    async fn list_short_links_by_slugs(&self, slugs: &[String]) -> StoreResult<Vec<ShortLink>>;
    async fn record_click(&self, slug: &str, at: DateTime<Utc>) -> StoreResult<()>;
    async fn clicks_since(
        &self,
        slugs: Option<&[String]>,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ShortClick>>;

    // Review requests
    async fn insert_review_request(&self, request: NewReviewRequest)
        -> StoreResult<ReviewRequest>;
    async fn count_review_requests_since(
        &self,
        business_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> StoreResult<i64>;

    // Email log
    async fn insert_email_log(&self, entry: NewEmailLogEntry) -> StoreResult<()>;
    async fn list_email_log(&self, limit: i64) -> StoreResult<Vec<EmailLogEntry>>;

    // Settings
    async fn get_setting(&self, key: &str) -> StoreResult<Option<JsonValue>>;
    async fn put_setting(&self, key: &str, value: JsonValue) -> StoreResult<()>;

    // Operations
    async fn health_check(&self) -> StoreResult<()>;
    /// Apply pending schema migrations, returning the versions applied
    async fn run_migrations(&self) -> StoreResult<Vec<String>>;
}
