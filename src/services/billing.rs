// Payments provider client
//
// `BillingProvider` is the seam the webhook processor, checkout handler
// and revenue reports talk to. `StripeClient` implements it over the
// Stripe REST API with form-encoded requests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::app_config::StripeConfig;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Payments provider request failed: {0}")]
    Upstream(String),

    #[error("Payments provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected provider response: {0}")]
    Decode(String),
}

/// Parameters for a subscription-mode checkout session
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub uid: String,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// An id field the provider may return either bare or expanded into an object
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPrice {
    pub id: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSubscriptionItem {
    pub price: ProviderPrice,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Default for ProviderList<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: Expandable,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: ProviderList<ProviderSubscriptionItem>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderSubscription {
    /// Price id of the first item
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }

    /// Period end from the subscription, falling back to its first item
    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .or_else(|| self.items.data.first().and_then(|item| item.current_period_end))
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderCharge {
    amount: i64,
    #[serde(default)]
    paid: bool,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Active subscriber count and monthly recurring revenue
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SubscriberStats {
    pub active: i64,
    #[serde(rename = "mrrUSD")]
    pub mrr_usd: f64,
}

impl SubscriberStats {
    pub fn zero() -> Self {
        Self {
            active: 0,
            mrr_usd: 0.0,
        }
    }
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError>;

    async fn retrieve_subscription(&self, id: &str) -> Result<ProviderSubscription, BillingError>;

    async fn retrieve_customer(&self, id: &str) -> Result<ProviderCustomer, BillingError>;

    /// Active subscriptions with item prices expanded
    async fn list_active_subscriptions(&self) -> Result<Vec<ProviderSubscription>, BillingError>;

    /// Sum of paid, succeeded charges created at or after `since`, in USD
    async fn sum_succeeded_charges_since(&self, since: DateTime<Utc>) -> Result<f64, BillingError>;
}

/// Monthly recurring revenue over active subscriptions.
///
/// Only items on the configured monthly or yearly price count; yearly
/// prices contribute a twelfth. Rounded to cents.
pub fn compute_mrr(
    subscriptions: &[ProviderSubscription],
    monthly_price_id: &str,
    yearly_price_id: Option<&str>,
) -> SubscriberStats {
    let mut active = 0;
    let mut mrr = 0.0_f64;

    for subscription in subscriptions {
        for item in &subscription.items.data {
            let amount = item.price.unit_amount.unwrap_or(0) as f64 / 100.0;
            let quantity = item.quantity.unwrap_or(1) as f64;

            if item.price.id == monthly_price_id {
                mrr += amount * quantity;
                active += 1;
            } else if yearly_price_id == Some(item.price.id.as_str()) {
                mrr += amount * quantity / 12.0;
                active += 1;
            }
        }
    }

    SubscriberStats {
        active,
        mrr_usd: (mrr * 100.0).round() / 100.0,
    }
}

/// Stripe REST client
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base_url: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BillingError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorBody>(&text)
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or(text);
            warn!("Payments provider error {}: {}", status, message);
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BillingError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BillingError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| BillingError::Upstream(e.to_string()))?;
        Self::parse(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, BillingError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| BillingError::Upstream(e.to_string()))?;
        Self::parse(response).await
    }
}

/// Form fields for a subscription checkout session
fn checkout_form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("mode", "subscription".to_string()),
        ("line_items[0][price]", request.price_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("metadata[uid]", request.uid.clone()),
        ("subscription_data[metadata][uid]", request.uid.clone()),
    ];
    if let Some(email) = &request.customer_email {
        form.push(("customer_email", email.clone()));
    }
    form
}

#[async_trait]
impl BillingProvider for StripeClient {
    #[instrument(skip(self, request), fields(uid = %request.uid, price = %request.price_id))]
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        self.post_form("/checkout/sessions", &checkout_form(&request))
            .await
    }

    #[instrument(skip(self))]
    async fn retrieve_subscription(&self, id: &str) -> Result<ProviderSubscription, BillingError> {
        self.get(&format!("/subscriptions/{}", id), &[]).await
    }

    #[instrument(skip(self))]
    async fn retrieve_customer(&self, id: &str) -> Result<ProviderCustomer, BillingError> {
        self.get(&format!("/customers/{}", id), &[]).await
    }

    #[instrument(skip(self))]
    async fn list_active_subscriptions(&self) -> Result<Vec<ProviderSubscription>, BillingError> {
        let list: ProviderList<ProviderSubscription> = self
            .get(
                "/subscriptions",
                &[
                    ("status", "active".to_string()),
                    ("limit", "100".to_string()),
                    ("expand[]", "data.items.data.price".to_string()),
                ],
            )
            .await?;
        if list.has_more {
            debug!("More than 100 active subscriptions; MRR covers the first page");
        }
        Ok(list.data)
    }

    #[instrument(skip(self))]
    async fn sum_succeeded_charges_since(&self, since: DateTime<Utc>) -> Result<f64, BillingError> {
        let list: ProviderList<ProviderCharge> = self
            .get(
                "/charges",
                &[
                    ("created[gte]", since.timestamp().to_string()),
                    ("limit", "100".to_string()),
                ],
            )
            .await?;

        let cents: i64 = list
            .data
            .iter()
            .filter(|charge| charge.paid && charge.status == "succeeded")
            .map(|charge| charge.amount)
            .sum();
        Ok(cents as f64 / 100.0)
    }
}
