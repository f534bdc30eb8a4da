// Subscription checkout, payment webhooks and plan entitlements

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::{
    app::AppState,
    middleware::{auth::header_value, AuthenticatedUser},
    services::{
        billing::CheckoutRequest,
        entitlements::{has_active_pro, plan_status, review_limit_status, ReviewLimitStatus},
        WebhookOutcome,
    },
    utils::{ApiError, ApiResult},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Monthly,
    Yearly,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    pub plan: Plan,
}

/// Start a subscription checkout for the caller
/// POST /api/stripe/checkout
#[instrument(skip(state, body), fields(uid = %user.uid))]
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: CheckoutBody = if body.is_empty() {
        CheckoutBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };

    let stripe = &state.config.stripe;
    let price_id = match body.plan {
        Plan::Monthly => stripe.price_id.clone(),
        Plan::Yearly => stripe
            .yearly_price_id
            .clone()
            .ok_or_else(|| ApiError::bad_request("Yearly plan is not available"))?,
    };

    let app_url = &state.config.server.app_url;
    let session = state
        .billing
        .create_checkout_session(CheckoutRequest {
            price_id,
            uid: user.uid.clone(),
            customer_email: user.email.clone(),
            success_url: format!("{}/dashboard?sub=success", app_url),
            cancel_url: format!("{}/pricing?canceled=1", app_url),
        })
        .await?;

    info!("Checkout session {} created for {}", session.id, user.uid);
    Ok(Json(json!({ "url": session.url })))
}

/// Payment provider webhook; the raw body is needed for the signature
/// POST /api/webhooks/stripe
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = header_value(&headers, STRIPE_SIGNATURE_HEADER);

    match state.webhooks.ingest(&body, signature).await? {
        WebhookOutcome::Duplicate => Ok(Json(json!({ "ok": true, "duplicate": true }))),
        WebhookOutcome::Processed => Ok(Json(json!({ "received": true }))),
    }
}

/// GET /api/entitlements
pub async fn entitlements(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Value>> {
    let pro = has_active_pro(state.store.as_ref(), &user.uid).await?;
    Ok(Json(json!({ "pro": pro })))
}

/// GET /api/plan/status
pub async fn get_plan_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Value>> {
    let status = plan_status(state.store.as_ref(), &user.uid).await?;
    Ok(Json(json!({ "status": status })))
}

/// GET /api/limits/reviews
pub async fn review_limits(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ReviewLimitStatus>> {
    let status = review_limit_status(state.store.as_ref(), &user.uid, Utc::now()).await?;
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults_to_monthly() {
        let body: CheckoutBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.plan, Plan::Monthly);

        let body: CheckoutBody = serde_json::from_str(r#"{"plan":"yearly"}"#).unwrap();
        assert_eq!(body.plan, Plan::Yearly);

        assert!(serde_json::from_str::<CheckoutBody>(r#"{"plan":"weekly"}"#).is_err());
    }
}
