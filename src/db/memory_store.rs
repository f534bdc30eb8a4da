// In-memory Store for local development (STORE_BACKEND=memory) and tests.
// Mirrors the unique keys and upsert semantics of the PostgreSQL schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{Store, StoreError, StoreResult};
use crate::models::{
    normalize_email, Business, BusinessMember, BusinessUpsert, EmailLogEntry, MemberInvite,
    NewEmailLogEntry, NewMemberInvite, NewReviewRequest, NewUser, NewWebhookEvent, ReviewRequest,
    Role, ShortClick, ShortLink, Subscription, SubscriptionUpsert, User, WebhookEvent,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    businesses: Vec<Business>,
    subscriptions: BTreeMap<String, Subscription>,
    stripe_customers: BTreeMap<String, String>,
    webhook_events: HashMap<String, WebhookEvent>,
    members: Vec<BusinessMember>,
    invites: Vec<MemberInvite>,
    short_links: BTreeMap<String, ShortLink>,
    short_clicks: Vec<ShortClick>,
    review_requests: Vec<ReviewRequest>,
    email_log: Vec<EmailLogEntry>,
    settings: HashMap<String, JsonValue>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded webhook events
    pub async fn webhook_event_count(&self) -> usize {
        self.tables.lock().await.webhook_events.len()
    }

    /// All subscription rows, for assertions
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.tables.lock().await.subscriptions.values().cloned().collect()
    }
}

fn apply_upsert(business: &mut Business, row: &BusinessUpsert) {
    business.name = row.name.clone();
    if let Some(v) = &row.google_place_id {
        business.google_place_id = Some(v.clone());
    }
    if let Some(v) = &row.google_maps_place_uri {
        business.google_maps_place_uri = Some(v.clone());
    }
    if let Some(v) = &row.google_maps_write_review_uri {
        business.google_maps_write_review_uri = Some(v.clone());
    }
    if let Some(v) = &row.review_link {
        business.review_link = Some(v.clone());
    }
    if let Some(v) = row.google_rating {
        business.google_rating = Some(v);
    }
    business.updated_at = row.updated_at;
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn upsert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        let entry = tables.users.entry(user.uid.clone()).or_insert_with(|| User {
            uid: user.uid.clone(),
            email: user.email.clone(),
            created_at: Utc::now(),
        });
        entry.email = user.email;
        Ok(entry.clone())
    }

    async fn find_user(&self, uid: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(uid).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let needle = normalize_email(email);
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.email == needle)
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_business_by_owner(&self, owner_uid: &str) -> StoreResult<Option<Business>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .businesses
            .iter()
            .find(|b| b.owner_uid == owner_uid)
            .cloned())
    }

    async fn find_business(&self, id: Uuid) -> StoreResult<Option<Business>> {
        let tables = self.tables.lock().await;
        Ok(tables.businesses.iter().find(|b| b.id == id).cloned())
    }

    async fn upsert_business(&self, row: BusinessUpsert) -> StoreResult<Business> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .businesses
            .iter_mut()
            .find(|b| b.owner_uid == row.owner_uid)
        {
            apply_upsert(existing, &row);
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let business = Business {
            id: Uuid::new_v4(),
            owner_uid: row.owner_uid,
            name: row.name,
            google_place_id: row.google_place_id,
            google_maps_place_uri: row.google_maps_place_uri,
            google_maps_write_review_uri: row.google_maps_write_review_uri,
            review_link: row.review_link,
            google_rating: row.google_rating,
            created_at: now,
            updated_at: row.updated_at,
        };
        tables.businesses.push(business.clone());
        Ok(business)
    }

    async fn list_businesses_by_owner(&self, owner_uid: &str) -> StoreResult<Vec<Business>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .businesses
            .iter()
            .filter(|b| b.owner_uid == owner_uid)
            .cloned()
            .collect())
    }

    async fn list_businesses(&self) -> StoreResult<Vec<Business>> {
        Ok(self.tables.lock().await.businesses.clone())
    }

    async fn count_businesses_created_since(&self, since: DateTime<Utc>) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .businesses
            .iter()
            .filter(|b| b.created_at >= since)
            .count() as i64)
    }

    async fn has_subscription_with_status(
        &self,
        uid: &str,
        statuses: &[&str],
    ) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .subscriptions
            .values()
            .any(|s| s.uid == uid && statuses.contains(&s.status.as_str())))
    }

    async fn latest_subscription(&self, uid: &str) -> StoreResult<Option<Subscription>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .subscriptions
            .values()
            .filter(|s| s.uid == uid)
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn upsert_subscription(&self, row: SubscriptionUpsert) -> StoreResult<Subscription> {
        let subscription = Subscription {
            stripe_subscription_id: row.stripe_subscription_id,
            uid: row.uid,
            plan_id: row.plan_id,
            status: row.status,
            current_period_end: row.current_period_end,
            updated_at: row.updated_at,
        };
        self.tables
            .lock()
            .await
            .subscriptions
            .insert(subscription.stripe_subscription_id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn list_subscriptions(
        &self,
        status: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<Subscription>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn upsert_stripe_customer(&self, uid: &str, customer_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .stripe_customers
            .iter()
            .any(|(other_uid, customer)| customer == customer_id && other_uid != uid)
        {
            return Err(StoreError::Conflict(format!(
                "customer {} already mapped",
                customer_id
            )));
        }
        tables
            .stripe_customers
            .insert(uid.to_string(), customer_id.to_string());
        Ok(())
    }

    async fn find_uid_by_customer(&self, customer_id: &str) -> StoreResult<Option<String>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .stripe_customers
            .iter()
            .find(|(_, customer)| customer.as_str() == customer_id)
            .map(|(uid, _)| uid.clone()))
    }

    async fn record_webhook_event(&self, event: NewWebhookEvent) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.webhook_events.contains_key(&event.id) {
            return Ok(false);
        }
        tables.webhook_events.insert(
            event.id.clone(),
            WebhookEvent {
                id: event.id,
                event_type: event.event_type,
                payload: event.payload,
                received_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn delete_webhook_event(&self, id: &str) -> StoreResult<()> {
        self.tables.lock().await.webhook_events.remove(id);
        Ok(())
    }

    async fn find_member(
        &self,
        business_id: Uuid,
        uid: &str,
    ) -> StoreResult<Option<BusinessMember>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .iter()
            .find(|m| m.business_id == business_id && m.uid == uid)
            .cloned())
    }

    async fn list_members(&self, business_id: Uuid) -> StoreResult<Vec<BusinessMember>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn upsert_member(&self, business_id: Uuid, uid: &str, role: Role) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        match tables
            .members
            .iter_mut()
            .find(|m| m.business_id == business_id && m.uid == uid)
        {
            Some(member) => member.role = role.as_str().to_string(),
            None => tables.members.push(BusinessMember {
                business_id,
                uid: uid.to_string(),
                role: role.as_str().to_string(),
                added_at: Utc::now(),
            }),
        }
        Ok(())
    }

    async fn remove_member(&self, business_id: Uuid, uid: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.members.len();
        tables
            .members
            .retain(|m| !(m.business_id == business_id && m.uid == uid));
        Ok(tables.members.len() < before)
    }

    async fn insert_invite(&self, invite: NewMemberInvite) -> StoreResult<MemberInvite> {
        let mut tables = self.tables.lock().await;
        if tables.invites.iter().any(|i| i.token == invite.token) {
            return Err(StoreError::Conflict("invite token already exists".to_string()));
        }
        let row = MemberInvite {
            token: invite.token,
            business_id: invite.business_id,
            email: invite.email,
            role: invite.role,
            invited_by: invite.invited_by,
            invited_at: Utc::now(),
            accepted_by: None,
            accepted_at: None,
        };
        tables.invites.push(row.clone());
        Ok(row)
    }

    async fn find_invite(&self, token: &str) -> StoreResult<Option<MemberInvite>> {
        let tables = self.tables.lock().await;
        Ok(tables.invites.iter().find(|i| i.token == token).cloned())
    }

    async fn mark_invite_accepted(&self, token: &str, uid: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables
            .invites
            .iter_mut()
            .find(|i| i.token == token && i.accepted_at.is_none())
        {
            Some(invite) => {
                invite.accepted_by = Some(uid.to_string());
                invite.accepted_at = Some(Utc::now());
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn list_invites(&self, business_id: Uuid) -> StoreResult<Vec<MemberInvite>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invites
            .iter()
            .filter(|i| i.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn insert_short_link(&self, link: ShortLink) -> StoreResult<ShortLink> {
        let mut tables = self.tables.lock().await;
        if tables.short_links.contains_key(&link.slug) {
            return Err(StoreError::Conflict(format!(
                "slug {} already exists",
                link.slug
            )));
        }
        tables.short_links.insert(link.slug.clone(), link.clone());
        Ok(link)
    }

    async fn find_short_link(&self, slug: &str) -> StoreResult<Option<ShortLink>> {
        Ok(self.tables.lock().await.short_links.get(slug).cloned())
    }

    async fn list_short_links_for_businesses(&self, ids: &[Uuid]) -> StoreResult<Vec<ShortLink>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .short_links
            .values()
            .filter(|l| ids.contains(&l.business_id))
            .cloned()
            .collect())
    }

    async fn list_short_links_by_slugs(&self, slugs: &[String]) -> StoreResult<Vec<ShortLink>> {
        let tables = self.tables.lock().await;
        Ok(slugs
            .iter()
            .filter_map(|s| tables.short_links.get(s).cloned())
            .collect())
    }

    async fn record_click(&self, slug: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let id = tables.short_clicks.len() as i64 + 1;
        tables.short_clicks.push(ShortClick {
            id,
            slug: slug.to_string(),
            ts: at,
        });
        Ok(())
    }

    async fn clicks_since(
        &self,
        slugs: Option<&[String]>,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ShortClick>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .short_clicks
            .iter()
            .filter(|c| c.ts >= since)
            .filter(|c| slugs.map_or(true, |wanted| wanted.contains(&c.slug)))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_review_request(
        &self,
        request: NewReviewRequest,
    ) -> StoreResult<ReviewRequest> {
        let row = ReviewRequest {
            id: request.id,
            business_id: request.business_id,
            google_place_id: request.google_place_id,
            review_link: request.review_link,
            status: request.status,
            provider_message_id: request.provider_message_id,
            created_at: Utc::now(),
        };
        self.tables.lock().await.review_requests.push(row.clone());
        Ok(row)
    }

    async fn count_review_requests_since(
        &self,
        business_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .review_requests
            .iter()
            .filter(|r| business_ids.contains(&r.business_id) && r.created_at >= since)
            .count() as i64)
    }

    async fn insert_email_log(&self, entry: NewEmailLogEntry) -> StoreResult<()> {
        self.tables.lock().await.email_log.push(EmailLogEntry {
            id: entry.id,
            provider: entry.provider,
            to_email: entry.to_email,
            template: entry.template,
            status: entry.status,
            provider_message_id: entry.provider_message_id,
            payload: entry.payload,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_email_log(&self, limit: i64) -> StoreResult<Vec<EmailLogEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .email_log
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<JsonValue>> {
        Ok(self.tables.lock().await.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: JsonValue) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .settings
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn run_migrations(&self) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: &str) -> NewWebhookEvent {
        NewWebhookEvent {
            id: id.to_string(),
            event_type: "checkout.session.completed".to_string(),
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn test_webhook_event_insert_or_skip() {
        let store = MemoryStore::new();
        assert!(store.record_webhook_event(event("evt_1")).await.unwrap());
        assert!(!store.record_webhook_event(event("evt_1")).await.unwrap());

        store.delete_webhook_event("evt_1").await.unwrap();
        assert!(store.record_webhook_event(event("evt_1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_business_upsert_keyed_by_owner() {
        let store = MemoryStore::new();
        let row = |name: &str, link: Option<&str>| BusinessUpsert {
            owner_uid: "owner".to_string(),
            name: name.to_string(),
            google_place_id: None,
            google_maps_place_uri: None,
            google_maps_write_review_uri: None,
            review_link: link.map(str::to_string),
            google_rating: None,
            updated_at: Utc::now(),
        };

        let first = store
            .upsert_business(row("Cafe", Some("https://example.com/a")))
            .await
            .unwrap();
        let second = store.upsert_business(row("Cafe Two", None)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Cafe Two");
        assert_eq!(second.review_link.as_deref(), Some("https://example.com/a"));
        assert_eq!(store.list_businesses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invite_can_only_be_accepted_once() {
        let store = MemoryStore::new();
        store
            .insert_invite(NewMemberInvite {
                token: "tok".to_string(),
                business_id: Uuid::new_v4(),
                email: "a@example.com".to_string(),
                role: "member".to_string(),
                invited_by: None,
            })
            .await
            .unwrap();

        assert!(store.mark_invite_accepted("tok", "u1").await.unwrap());
        assert!(!store.mark_invite_accepted("tok", "u2").await.unwrap());
        assert!(!store.mark_invite_accepted("missing", "u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_user_email_lookup_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .upsert_user(NewUser::new("u1", "Owner@Example.com"))
            .await
            .unwrap();

        let found = store.find_user_by_email("OWNER@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.uid), Some("u1".to_string()));
    }
}
