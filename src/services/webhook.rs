// Payment webhook ingestion
//
// Events arrive at least once. The event id is recorded before any side
// effect; a replay finds the row and is acknowledged without touching
// subscription state. Subscription rows are always written from the
// provider's current view of the subscription, never from the event body.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::db::{Store, StoreError};
use crate::models::{normalize_email, NewWebhookEvent, SubscriptionUpsert};
use crate::services::billing::{BillingError, BillingProvider, Expandable, ProviderSubscription};
use crate::utils::audit_logger::{AuditAction, AuditLogger};
use crate::utils::stripe_signature::{verify_signature, SignatureError};

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("{0}")]
    Signature(#[from] SignatureError),

    #[error("Invalid event payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event id seen before; nothing was applied
    Duplicate,
    Processed,
}

/// Event envelope; `data.object` is typed per event type by [`ProviderEvent::into_object`]
#[derive(Debug, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: ProviderEventData,
}

#[derive(Debug, Deserialize)]
pub struct ProviderEventData {
    pub object: JsonValue,
}

/// Event bodies this service acts on
#[derive(Debug)]
pub enum EventObject {
    CheckoutSessionCompleted(CheckoutSessionObject),
    SubscriptionChanged(SubscriptionObject),
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub subscription: Option<Expandable>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: Expandable,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

impl CheckoutSessionObject {
    /// Account uid stamped on the session at checkout
    pub fn uid(&self) -> Option<&str> {
        non_empty(self.metadata.as_ref().and_then(|m| m.get("uid")).map(String::as_str))
    }

    /// Payer email, preferring what the customer typed at checkout
    pub fn payer_email(&self) -> Option<&str> {
        non_empty(
            self.customer_details
                .as_ref()
                .and_then(|details| details.email.as_deref()),
        )
        .or_else(|| non_empty(self.customer_email.as_deref()))
    }
}

impl ProviderEvent {
    /// Typed body for handled event types, `None` for the rest
    pub fn into_object(self) -> Result<Option<EventObject>, WebhookError> {
        fn parse<T: DeserializeOwned>(object: JsonValue) -> Result<T, WebhookError> {
            serde_json::from_value(object).map_err(|e| WebhookError::Payload(e.to_string()))
        }

        let object = match self.event_type.as_str() {
            "checkout.session.completed" => {
                EventObject::CheckoutSessionCompleted(parse(self.data.object)?)
            },
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted" => {
                EventObject::SubscriptionChanged(parse(self.data.object)?)
            },
            _ => return Ok(None),
        };
        Ok(Some(object))
    }
}

#[derive(Clone)]
pub struct WebhookService {
    store: Arc<dyn Store>,
    billing: Arc<dyn BillingProvider>,
    secret: String,
    tolerance_seconds: i64,
}

impl WebhookService {
    pub fn new(
        store: Arc<dyn Store>,
        billing: Arc<dyn BillingProvider>,
        secret: String,
        tolerance_seconds: i64,
    ) -> Self {
        Self {
            store,
            billing,
            secret,
            tolerance_seconds,
        }
    }

    /// Verify, dedup and apply one delivery
    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn ingest(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        verify_signature(
            payload,
            signature,
            &self.secret,
            self.tolerance_seconds,
            Utc::now().timestamp(),
        )?;

        let raw: JsonValue =
            serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))?;
        let event: ProviderEvent = serde_json::from_value(raw.clone())
            .map_err(|e| WebhookError::Payload(e.to_string()))?;
        let event_id = event.id.clone();
        let event_type = event.event_type.clone();

        let recorded = self
            .store
            .record_webhook_event(NewWebhookEvent {
                id: event_id.clone(),
                event_type: event_type.clone(),
                payload: raw,
            })
            .await?;

        if !recorded {
            info!("Duplicate webhook event {} ({})", event_id, event_type);
            return Ok(WebhookOutcome::Duplicate);
        }

        if let Err(e) = self.process(event).await {
            warn!("Webhook event {} failed, releasing dedup row: {}", event_id, e);
            if let Err(release) = self.store.delete_webhook_event(&event_id).await {
                warn!("Failed to release webhook event {}: {}", event_id, release);
            }
            return Err(e);
        }

        Ok(WebhookOutcome::Processed)
    }

    async fn process(&self, event: ProviderEvent) -> Result<(), WebhookError> {
        let event_type = event.event_type.clone();
        match event.into_object()? {
            Some(EventObject::CheckoutSessionCompleted(session)) => {
                self.handle_checkout_completed(&session).await
            },
            Some(EventObject::SubscriptionChanged(subscription)) => {
                self.handle_subscription_change(&subscription).await
            },
            None => {
                info!("Ignoring webhook event type {}", event_type);
                Ok(())
            },
        }
    }

    async fn handle_checkout_completed(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<(), WebhookError> {
        let uid = match (session.uid(), session.payer_email()) {
            (Some(uid), _) => Some(uid.to_string()),
            (None, Some(email)) => self
                .store
                .find_user_by_email(&normalize_email(email))
                .await?
                .map(|user| user.uid),
            (None, None) => None,
        };

        let Some(uid) = uid else {
            warn!("Checkout session {} has no resolvable payer", session.id);
            return Ok(());
        };

        if let Some(customer) = &session.customer {
            self.store.upsert_stripe_customer(&uid, customer.id()).await?;
        }

        if let Some(subscription) = &session.subscription {
            let subscription = self.billing.retrieve_subscription(subscription.id()).await?;
            self.save_subscription(&uid, &subscription).await?;
        }

        Ok(())
    }

    async fn handle_subscription_change(
        &self,
        object: &SubscriptionObject,
    ) -> Result<(), WebhookError> {
        let subscription_id = object.id.as_str();
        let customer_id = object.customer.id();

        let Some(uid) = self.resolve_uid_for_customer(customer_id).await? else {
            warn!(
                "No local user for customer {}; subscription {} not recorded",
                customer_id, subscription_id
            );
            return Ok(());
        };

        let subscription = self.billing.retrieve_subscription(subscription_id).await?;
        self.save_subscription(&uid, &subscription).await
    }

    /// Stored mapping first, then the provider customer's email, backfilling the mapping
    async fn resolve_uid_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<String>, WebhookError> {
        if let Some(uid) = self.store.find_uid_by_customer(customer_id).await? {
            return Ok(Some(uid));
        }

        let customer = self.billing.retrieve_customer(customer_id).await?;
        if customer.deleted {
            return Ok(None);
        }
        let Some(email) = customer.email.as_deref() else {
            return Ok(None);
        };

        let Some(user) = self.store.find_user_by_email(&normalize_email(email)).await? else {
            return Ok(None);
        };

        self.store.upsert_stripe_customer(&user.uid, customer_id).await?;
        Ok(Some(user.uid))
    }

    async fn save_subscription(
        &self,
        uid: &str,
        subscription: &ProviderSubscription,
    ) -> Result<(), WebhookError> {
        self.store
            .upsert_subscription(SubscriptionUpsert {
                stripe_subscription_id: subscription.id.clone(),
                uid: uid.to_string(),
                plan_id: subscription.price_id().map(str::to_string),
                status: subscription.status.clone(),
                current_period_end: subscription.period_end(),
                updated_at: Utc::now(),
            })
            .await?;

        AuditLogger::log(
            AuditAction::SubscriptionSynced,
            "stripe",
            "subscription",
            Some(subscription.id.clone()),
            Some(format!("uid={} status={}", uid, subscription.status)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewUser;
    use crate::services::billing::{CheckoutRequest, CheckoutSession, ProviderCustomer};
    use crate::utils::stripe_signature::compute_signature;
    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    struct StaticBilling {
        status: &'static str,
        customer_email: Option<&'static str>,
    }

    #[async_trait]
    impl BillingProvider for StaticBilling {
        async fn create_checkout_session(
            &self,
            _request: CheckoutRequest,
        ) -> Result<CheckoutSession, BillingError> {
            Err(BillingError::Upstream("unused".to_string()))
        }

        async fn retrieve_subscription(
            &self,
            id: &str,
        ) -> Result<ProviderSubscription, BillingError> {
            Ok(serde_json::from_value(json!({
                "id": id,
                "customer": "cus_1",
                "status": self.status,
                "current_period_end": 1_900_000_000,
                "items": { "data": [ { "price": { "id": "price_monthly" } } ] }
            }))
            .unwrap())
        }

        async fn retrieve_customer(&self, id: &str) -> Result<ProviderCustomer, BillingError> {
            Ok(ProviderCustomer {
                id: id.to_string(),
                email: self.customer_email.map(str::to_string),
                deleted: false,
            })
        }

        async fn list_active_subscriptions(
            &self,
        ) -> Result<Vec<ProviderSubscription>, BillingError> {
            Ok(vec![])
        }

        async fn sum_succeeded_charges_since(
            &self,
            _since: DateTime<Utc>,
        ) -> Result<f64, BillingError> {
            Ok(0.0)
        }
    }

    fn service(store: Arc<MemoryStore>, billing: StaticBilling) -> WebhookService {
        WebhookService::new(store, Arc::new(billing), SECRET.to_string(), 300)
    }

    fn signed(payload: &[u8]) -> String {
        let ts = Utc::now().timestamp();
        format!("t={},v1={}", ts, compute_signature(SECRET, ts, payload))
    }

    #[tokio::test]
    async fn test_checkout_completed_records_customer_and_subscription() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            store.clone(),
            StaticBilling {
                status: "active",
                customer_email: None,
            },
        );

        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "uid": "uid-1" }
            }}
        })
        .to_string();

        let outcome = service
            .ingest(payload.as_bytes(), Some(&signed(payload.as_bytes())))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        assert_eq!(
            store.find_uid_by_customer("cus_1").await.unwrap().as_deref(),
            Some("uid-1")
        );
        let sub = store.latest_subscription("uid-1").await.unwrap().unwrap();
        assert_eq!(sub.status, "active");
        assert_eq!(sub.plan_id.as_deref(), Some("price_monthly"));
        assert_eq!(sub.current_period_end.map(|t| t.timestamp()), Some(1_900_000_000));
    }

    #[tokio::test]
    async fn test_subscription_event_backfills_customer_by_email() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(NewUser::new("uid-2", "Payer@Example.com"))
            .await
            .unwrap();
        let service = service(
            store.clone(),
            StaticBilling {
                status: "trialing",
                customer_email: Some("payer@example.com"),
            },
        );

        let payload = json!({
            "id": "evt_2",
            "type": "customer.subscription.updated",
            "data": { "object": { "id": "sub_2", "customer": "cus_2", "status": "active" } }
        })
        .to_string();

        service
            .ingest(payload.as_bytes(), Some(&signed(payload.as_bytes())))
            .await
            .unwrap();

        assert_eq!(
            store.find_uid_by_customer("cus_2").await.unwrap().as_deref(),
            Some("uid-2")
        );
        // Provider state wins over the event body
        let sub = store.latest_subscription("uid-2").await.unwrap().unwrap();
        assert_eq!(sub.status, "trialing");
    }

    #[tokio::test]
    async fn test_unresolvable_payer_is_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            store.clone(),
            StaticBilling {
                status: "active",
                customer_email: Some("nobody@example.com"),
            },
        );

        let payload = json!({
            "id": "evt_3",
            "type": "customer.subscription.created",
            "data": { "object": { "id": "sub_3", "customer": "cus_3" } }
        })
        .to_string();

        let outcome = service
            .ingest(payload.as_bytes(), Some(&signed(payload.as_bytes())))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);
        assert!(store.subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_with_expanded_customer_and_payer_email() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(NewUser::new("uid-5", "buyer@example.com"))
            .await
            .unwrap();
        let service = service(
            store.clone(),
            StaticBilling {
                status: "active",
                customer_email: None,
            },
        );

        let payload = json!({
            "id": "evt_5",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_5",
                "customer": { "id": "cus_5", "object": "customer" },
                "subscription": null,
                "metadata": null,
                "customer_email": null,
                "customer_details": { "email": "Buyer@Example.com" }
            }}
        })
        .to_string();

        service
            .ingest(payload.as_bytes(), Some(&signed(payload.as_bytes())))
            .await
            .unwrap();

        assert_eq!(
            store.find_uid_by_customer("cus_5").await.unwrap().as_deref(),
            Some("uid-5")
        );
        assert!(store.latest_subscription("uid-5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_subscription_releases_dedup_row() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            store.clone(),
            StaticBilling {
                status: "active",
                customer_email: None,
            },
        );

        let payload = json!({
            "id": "evt_6",
            "type": "customer.subscription.updated",
            "data": { "object": { "id": "sub_6" } }
        })
        .to_string();

        let result = service
            .ingest(payload.as_bytes(), Some(&signed(payload.as_bytes())))
            .await;
        assert!(matches!(result, Err(WebhookError::Payload(_))));
        assert_eq!(store.webhook_event_count().await, 0);
    }

    #[test]
    fn test_unhandled_event_types_have_no_object() {
        let event: ProviderEvent = serde_json::from_value(json!({
            "id": "evt_7",
            "type": "invoice.paid",
            "data": { "object": { "id": "in_7" } }
        }))
        .unwrap();
        assert!(event.into_object().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_signature_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            store.clone(),
            StaticBilling {
                status: "active",
                customer_email: None,
            },
        );

        let payload = br#"{"id":"evt_4","type":"ping","data":{"object":{}}}"#;
        let result = service.ingest(payload, Some("t=1,v1=deadbeef")).await;

        assert!(matches!(result, Err(WebhookError::Signature(_))));
        assert_eq!(store.webhook_event_count().await, 0);
    }
}
