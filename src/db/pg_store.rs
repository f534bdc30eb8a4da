// PostgreSQL-backed Store on diesel-async + bb8

use async_trait::async_trait;
use bb8::PooledConnection;
use chrono::{DateTime, Utc};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::diesel_pool::{check_diesel_health, DieselPool};
use super::store::{Store, StoreError, StoreResult};
use crate::models::{
    AppSetting, Business, BusinessMember, BusinessUpsert, EmailLogEntry, MemberInvite,
    NewEmailLogEntry, NewMemberInvite, NewReviewRequest, NewUser, NewWebhookEvent, ReviewRequest,
    Role, ShortClick, ShortLink, StripeCustomer, Subscription, SubscriptionUpsert, User,
    WebhookEvent,
};

type Conn<'a> = PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Clone)]
pub struct PgStore {
    pool: DieselPool,
    database_url: String,
}

impl PgStore {
    pub fn new(pool: DieselPool, database_url: impl Into<String>) -> Self {
        Self {
            pool,
            database_url: database_url.into(),
        }
    }

    async fn conn(&self) -> StoreResult<Conn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn upsert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.conn().await?;
        Ok(User::upsert(&mut conn, &user).await?)
    }

    async fn find_user(&self, uid: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        Ok(User::find_by_uid(&mut conn, uid).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        Ok(User::find_by_email(&mut conn, email).await?)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let mut conn = self.conn().await?;
        Ok(User::list(&mut conn, limit, offset).await?)
    }

    async fn find_business_by_owner(&self, owner_uid: &str) -> StoreResult<Option<Business>> {
        let mut conn = self.conn().await?;
        Ok(Business::find_by_owner(&mut conn, owner_uid).await?)
    }

    async fn find_business(&self, id: Uuid) -> StoreResult<Option<Business>> {
        let mut conn = self.conn().await?;
        Ok(Business::find_by_id(&mut conn, id).await?)
    }

    async fn upsert_business(&self, row: BusinessUpsert) -> StoreResult<Business> {
        let mut conn = self.conn().await?;
        Ok(Business::upsert(&mut conn, &row).await?)
    }

    async fn list_businesses_by_owner(&self, owner_uid: &str) -> StoreResult<Vec<Business>> {
        let mut conn = self.conn().await?;
        Ok(Business::list_by_owner(&mut conn, owner_uid).await?)
    }

    async fn list_businesses(&self) -> StoreResult<Vec<Business>> {
        let mut conn = self.conn().await?;
        Ok(Business::list_all(&mut conn).await?)
    }

    async fn count_businesses_created_since(&self, since: DateTime<Utc>) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        Ok(Business::count_created_since(&mut conn, since).await?)
    }

    async fn has_subscription_with_status(
        &self,
        uid: &str,
        statuses: &[&str],
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        Ok(Subscription::exists_with_status(&mut conn, uid, statuses).await?)
    }

    async fn latest_subscription(&self, uid: &str) -> StoreResult<Option<Subscription>> {
        let mut conn = self.conn().await?;
        Ok(Subscription::latest_for_uid(&mut conn, uid).await?)
    }

    async fn upsert_subscription(&self, row: SubscriptionUpsert) -> StoreResult<Subscription> {
        let mut conn = self.conn().await?;
        Ok(Subscription::upsert(&mut conn, &row).await?)
    }

    async fn list_subscriptions(
        &self,
        status: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<Subscription>> {
        let mut conn = self.conn().await?;
        Ok(Subscription::list(&mut conn, status, limit).await?)
    }

    async fn upsert_stripe_customer(&self, uid: &str, customer_id: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        StripeCustomer::upsert(&mut conn, uid, customer_id).await?;
        Ok(())
    }

    async fn find_uid_by_customer(&self, customer_id: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(StripeCustomer::find_uid_by_customer(&mut conn, customer_id).await?)
    }

    async fn record_webhook_event(&self, event: NewWebhookEvent) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        Ok(WebhookEvent::record(&mut conn, &event).await?)
    }

    async fn delete_webhook_event(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        WebhookEvent::delete(&mut conn, id).await?;
        Ok(())
    }

    async fn find_member(
        &self,
        business_id: Uuid,
        uid: &str,
    ) -> StoreResult<Option<BusinessMember>> {
        let mut conn = self.conn().await?;
        Ok(BusinessMember::find(&mut conn, business_id, uid).await?)
    }

    async fn list_members(&self, business_id: Uuid) -> StoreResult<Vec<BusinessMember>> {
        let mut conn = self.conn().await?;
        Ok(BusinessMember::list_for_business(&mut conn, business_id).await?)
    }

    async fn upsert_member(&self, business_id: Uuid, uid: &str, role: Role) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        BusinessMember::upsert(&mut conn, business_id, uid, role).await?;
        Ok(())
    }

    async fn remove_member(&self, business_id: Uuid, uid: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        Ok(BusinessMember::remove(&mut conn, business_id, uid).await? > 0)
    }

    async fn insert_invite(&self, invite: NewMemberInvite) -> StoreResult<MemberInvite> {
        let mut conn = self.conn().await?;
        Ok(MemberInvite::insert(&mut conn, &invite).await?)
    }

    async fn find_invite(&self, token: &str) -> StoreResult<Option<MemberInvite>> {
        let mut conn = self.conn().await?;
        Ok(MemberInvite::find_by_token(&mut conn, token).await?)
    }

    async fn mark_invite_accepted(&self, token: &str, uid: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        Ok(MemberInvite::mark_accepted(&mut conn, token, uid).await?)
    }

    async fn list_invites(&self, business_id: Uuid) -> StoreResult<Vec<MemberInvite>> {
        let mut conn = self.conn().await?;
        Ok(MemberInvite::list_for_business(&mut conn, business_id).await?)
    }

    async fn insert_short_link(&self, link: ShortLink) -> StoreResult<ShortLink> {
        let mut conn = self.conn().await?;
        ShortLink::insert(&mut conn, &link).await.map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => StoreError::Conflict(format!("slug {} already exists", link.slug)),
            other => StoreError::Database(other),
        })
    }

    async fn find_short_link(&self, slug: &str) -> StoreResult<Option<ShortLink>> {
        let mut conn = self.conn().await?;
        Ok(ShortLink::find_by_slug(&mut conn, slug).await?)
    }

    async fn list_short_links_for_businesses(&self, ids: &[Uuid]) -> StoreResult<Vec<ShortLink>> {
        let mut conn = self.conn().await?;
        Ok(ShortLink::list_for_businesses(&mut conn, ids).await?)
    }

    async fn list_short_links_by_slugs(&self, slugs: &[String]) -> StoreResult<Vec<ShortLink>> {
        let mut conn = self.conn().await?;
        Ok(ShortLink::list_by_slugs(&mut conn, slugs).await?)
    }

    async fn record_click(&self, slug: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        ShortClick::record(&mut conn, slug, at).await?;
        Ok(())
    }

    async fn clicks_since(
        &self,
        slugs: Option<&[String]>,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ShortClick>> {
        let mut conn = self.conn().await?;
        Ok(ShortClick::since(&mut conn, slugs, since, limit).await?)
    }

    async fn insert_review_request(
        &self,
        request: NewReviewRequest,
    ) -> StoreResult<ReviewRequest> {
        let mut conn = self.conn().await?;
        Ok(ReviewRequest::insert(&mut conn, &request).await?)
    }

    async fn count_review_requests_since(
        &self,
        business_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        Ok(ReviewRequest::count_since(&mut conn, business_ids, since).await?)
    }

    async fn insert_email_log(&self, entry: NewEmailLogEntry) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        EmailLogEntry::insert(&mut conn, &entry).await?;
        Ok(())
    }

    async fn list_email_log(&self, limit: i64) -> StoreResult<Vec<EmailLogEntry>> {
        let mut conn = self.conn().await?;
        Ok(EmailLogEntry::list_recent(&mut conn, limit).await?)
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<JsonValue>> {
        let mut conn = self.conn().await?;
        Ok(AppSetting::get(&mut conn, key).await?)
    }

    async fn put_setting(&self, key: &str, value: JsonValue) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        AppSetting::put(&mut conn, key, &value).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        check_diesel_health(&self.pool)
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }

    async fn run_migrations(&self) -> StoreResult<Vec<String>> {
        crate::migrations::diesel::run_migrations(self.database_url.clone())
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }
}
