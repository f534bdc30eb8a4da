// Common test utilities and helper structs
// Shared across all test files to avoid duplication
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, Response, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use reviews_backend::{
    app::AppState,
    app_config::AppConfig,
    build_router,
    db::{MemoryStore, Store},
    models::{AuthEmailType, Business, NewUser, SubscriptionUpsert, UpsertBusinessRequest, VerifiedIdentity},
    services::{
        billing::{
            BillingError, BillingProvider, CheckoutRequest, CheckoutSession, ProviderCustomer,
            ProviderSubscription,
        },
        email::{EmailError, EmailMessage, EmailTransport, SentEmail, TemplatedEmail},
        identity::{IdentityError, IdentityProvider},
        places::{PlaceDetails, PlaceSuggestion, PlacesError, PlacesProvider, StaticMapParams},
    },
    utils::stripe_signature::compute_signature,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

pub const APP_URL: &str = "https://app.example.com";
pub const ADMIN_TOKEN: &str = "admin-token-123";
pub const CRON_TOKEN: &str = "cron-token-456";
pub const MIGRATIONS_TOKEN: &str = "migrate-once-789";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const MONTHLY_PRICE: &str = "price_monthly";
pub const YEARLY_PRICE: &str = "price_yearly";

/// Configuration for an in-memory app with every token set
pub fn test_config() -> AppConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("APP_URL", APP_URL),
        ("STORE_BACKEND", "memory"),
        ("ENVIRONMENT", "test"),
        ("SESSION_SECRET", "test-secret-that-is-at-least-32-characters-long"),
        ("FIREBASE_PROJECT_ID", "reviews-test"),
        ("STRIPE_SECRET_KEY", "sk_test_123"),
        ("STRIPE_PRICE_ID", MONTHLY_PRICE),
        ("STRIPE_YEARLY_PRICE_ID", YEARLY_PRICE),
        ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("POSTMARK_SERVER_TOKEN", "pm-token"),
        ("EMAIL_FROM", "hello@example.com"),
        ("GOOGLE_MAPS_API_KEY", "maps-key"),
        ("ADMIN_TOKEN", ADMIN_TOKEN),
        ("CRON_DIGEST_TOKEN", CRON_TOKEN),
        ("MIGRATIONS_ONCE_TOKEN", MIGRATIONS_TOKEN),
        ("CORS_ALLOWED_ORIGINS", "https://app.example.com"),
    ]);
    AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("test config should load")
}

/// Accepts tokens of the form `valid:<uid>[:<email>]`
pub struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let mut parts = id_token.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("valid"), Some(uid), email) if !uid.is_empty() => Ok(VerifiedIdentity {
                uid: uid.to_string(),
                email: email.map(str::to_string),
            }),
            _ => Err(IdentityError::InvalidToken("bad token".to_string())),
        }
    }

    async fn generate_action_link(
        &self,
        email: &str,
        kind: AuthEmailType,
    ) -> Result<String, IdentityError> {
        let mode = match kind {
            AuthEmailType::Verify => "verifyEmail",
            AuthEmailType::Reset => "resetPassword",
        };
        Ok(format!("https://auth.example.com/action?mode={}&email={}", mode, email))
    }
}

/// Payments provider double holding subscriptions and customers in memory
#[derive(Default)]
pub struct FakeBilling {
    pub subscriptions: Mutex<HashMap<String, ProviderSubscription>>,
    pub customers: Mutex<HashMap<String, ProviderCustomer>>,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
}

impl FakeBilling {
    pub async fn put_subscription(&self, id: &str, customer: &str, status: &str, price: &str) {
        let subscription: ProviderSubscription = serde_json::from_value(json!({
            "id": id,
            "customer": customer,
            "status": status,
            "items": {
                "data": [{
                    "price": { "id": price, "unit_amount": 2900 },
                    "quantity": 1,
                    "current_period_end": 1_900_000_000
                }]
            }
        }))
        .expect("valid subscription fixture");
        self.subscriptions.lock().await.insert(id.to_string(), subscription);
    }

    pub async fn put_customer(&self, id: &str, email: &str) {
        self.customers.lock().await.insert(
            id.to_string(),
            ProviderCustomer {
                id: id.to_string(),
                email: Some(email.to_string()),
                deleted: false,
            },
        );
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let url = format!("https://checkout.example.com/pay/{}", request.price_id);
        self.checkouts.lock().await.push(request);
        Ok(CheckoutSession {
            id: "cs_test_1".to_string(),
            url: Some(url),
        })
    }

    async fn retrieve_subscription(&self, id: &str) -> Result<ProviderSubscription, BillingError> {
        self.subscriptions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BillingError::Api {
                status: 404,
                message: format!("No such subscription: '{}'", id),
            })
    }

    async fn retrieve_customer(&self, id: &str) -> Result<ProviderCustomer, BillingError> {
        self.customers
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BillingError::Api {
                status: 404,
                message: format!("No such customer: '{}'", id),
            })
    }

    async fn list_active_subscriptions(&self) -> Result<Vec<ProviderSubscription>, BillingError> {
        Ok(self
            .subscriptions
            .lock()
            .await
            .values()
            .filter(|s| s.status == "active")
            .cloned()
            .collect())
    }

    async fn sum_succeeded_charges_since(&self, _since: DateTime<Utc>) -> Result<f64, BillingError> {
        Ok(58.0)
    }
}

/// Email transport that records instead of sending; `failing` rejects every send
#[derive(Default)]
pub struct RecordingTransport {
    pub messages: Mutex<Vec<EmailMessage>>,
    pub templates: Mutex<Vec<TemplatedEmail>>,
    pub failing: AtomicBool,
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, message: EmailMessage) -> Result<SentEmail, EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::ServiceUnavailable);
        }
        let mut messages = self.messages.lock().await;
        messages.push(message);
        Ok(SentEmail {
            message_id: Some(format!("msg-{}", messages.len())),
        })
    }

    async fn send_template(&self, email: TemplatedEmail) -> Result<SentEmail, EmailError> {
        let mut templates = self.templates.lock().await;
        templates.push(email);
        Ok(SentEmail {
            message_id: Some(format!("tpl-{}", templates.len())),
        })
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Places double; the static map upstream can be made to fail
#[derive(Default)]
pub struct FakePlaces {
    pub map_fails: bool,
}

pub const FAKE_MAP_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-map";

#[async_trait]
impl PlacesProvider for FakePlaces {
    async fn autocomplete(
        &self,
        input: &str,
        _session_token: Option<&str>,
        region_codes: Vec<String>,
    ) -> Result<Vec<PlaceSuggestion>, PlacesError> {
        Ok(vec![PlaceSuggestion {
            place_id: "ChIJ123".to_string(),
            main_text: input.to_string(),
            secondary_text: region_codes.join(","),
        }])
    }

    async fn details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError> {
        Ok(PlaceDetails {
            id: place_id.to_string(),
            display_name: Some("Joe's Pizza".to_string()),
            write_a_review_uri: Some(format!(
                "https://search.google.com/local/writereview?placeid={}",
                place_id
            )),
            ..Default::default()
        })
    }

    async fn static_map(&self, _params: &StaticMapParams) -> Result<Vec<u8>, PlacesError> {
        if self.map_fails {
            Err(PlacesError::Upstream("connection refused".to_string()))
        } else {
            Ok(FAKE_MAP_PNG.to_vec())
        }
    }

    fn default_region_codes(&self) -> Vec<String> {
        vec!["US".to_string()]
    }
}

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub billing: Arc<FakeBilling>,
    pub transport: Arc<RecordingTransport>,
}

impl TestApp {
    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "GET", uri)
    }

    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "POST", uri)
    }

    pub fn delete(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "DELETE", uri)
    }

    pub fn options(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "OPTIONS", uri)
    }

    /// Mirror a user and return a `Cookie` header value carrying their session
    pub async fn sign_in(&self, uid: &str, email: &str) -> String {
        self.store.upsert_user(NewUser::new(uid, email)).await.unwrap();
        let token = self.state.sessions.issue(uid, email, 7).unwrap();
        format!("{}={}", self.state.sessions.cookie_name(), token)
    }

    pub async fn create_business(&self, owner_uid: &str, place_id: &str) -> Business {
        self.store
            .upsert_business(
                UpsertBusinessRequest {
                    name: "Joe's Pizza".to_string(),
                    google_place_id: Some(place_id.to_string()),
                    google_maps_place_uri: None,
                    google_maps_write_review_uri: None,
                    review_link: None,
                    google_rating: Some(4.6),
                }
                .into_upsert(owner_uid),
            )
            .await
            .unwrap()
    }

    pub async fn set_subscription(&self, uid: &str, sub_id: &str, status: &str) {
        self.store
            .upsert_subscription(SubscriptionUpsert {
                stripe_subscription_id: sub_id.to_string(),
                uid: uid.to_string(),
                plan_id: Some(MONTHLY_PRICE.to_string()),
                status: status.to_string(),
                current_period_end: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    pub async fn grant_pro(&self, uid: &str) {
        self.set_subscription(uid, &format!("sub_{}", uid), "active").await;
    }
}

/// Signed `Stripe-Signature` header value for `payload` at `timestamp`
pub fn stripe_signature(payload: &[u8], timestamp: i64) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_signature(WEBHOOK_SECRET, timestamp, payload)
    )
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    body: Body,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &str, uri: &str) -> Self {
        Self {
            app,
            method: method.to_string(),
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Body::empty(),
        }
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        self.body = Body::from(serde_json::to_vec(body).unwrap());
        self
    }

    pub fn raw(mut self, bytes: Vec<u8>) -> Self {
        self.body = Body::from(bytes);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn cookie(self, cookie: &str) -> Self {
        self.header("cookie", cookie)
    }

    /// Send the request
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method.as_str()).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(self.body).unwrap();

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn content_type(&self) -> Option<String> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub async fn bytes(self) -> Vec<u8> {
        axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    /// Parse JSON response
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        serde_json::from_slice(&self.bytes().await).unwrap()
    }

    pub async fn text(self) -> String {
        String::from_utf8(self.bytes().await).unwrap()
    }
}

/// Setup test application with the in-memory store and provider doubles
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(FakePlaces::default()).await
}

pub async fn setup_test_app_with(places: FakePlaces) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let billing = Arc::new(FakeBilling::default());
    let transport = Arc::new(RecordingTransport::default());

    let state = AppState::new(
        test_config(),
        store.clone(),
        Arc::new(FakeIdentity),
        billing.clone(),
        transport.clone(),
        Arc::new(places),
    )
    .expect("app state should build");

    TestApp {
        app: build_router(state.clone()),
        state,
        store,
        billing,
        transport,
    }
}
