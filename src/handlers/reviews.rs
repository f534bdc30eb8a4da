// Review request emails

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    models::{make_google_review_link, normalize_email, NewReviewRequest, SendReviewRequest},
    services::{
        entitlements::review_limit_status,
        roles::{can_send_review_requests, resolve_role},
    },
    utils::{trim_optional_field, ApiError, ApiJson, ApiResult, AuditAction, AuditLogger},
};

/// Email a customer a link to review the business.
/// Starter businesses are capped per calendar month.
/// POST /api/reviews/send
#[instrument(skip(state, request), fields(uid = %user.uid, business_id = %request.business_id))]
pub async fn send_review_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<SendReviewRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;

    let store = state.store.as_ref();
    let role = resolve_role(store, &user.uid, request.business_id).await?;
    if !can_send_review_requests(role) {
        return Err(ApiError::forbidden());
    }

    let business = store
        .find_business(request.business_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Business not found"))?;

    // Quota follows the business owner's plan
    let limit = review_limit_status(store, &business.owner_uid, Utc::now()).await?;
    if limit.exhausted() {
        return Err(ApiError::Forbidden(
            "Monthly review request limit reached. Upgrade to Pro for unlimited requests."
                .to_string(),
        ));
    }

    let place_id = trim_optional_field(request.place_id.as_ref())
        .or_else(|| business.google_place_id.clone());
    let review_link = trim_optional_field(request.review_link.as_ref())
        .or_else(|| {
            trim_optional_field(request.place_id.as_ref())
                .map(|id| make_google_review_link(&id))
        })
        .or_else(|| business.review_link.clone())
        .ok_or_else(|| ApiError::bad_request("Missing review link"))?;

    let to_email = normalize_email(&request.to_email);
    let customer_name = trim_optional_field(request.customer_name.as_ref());

    let sent = state
        .email
        .send_review_request(&to_email, customer_name.as_deref(), &business.name, &review_link)
        .await?;

    let saved = store
        .insert_review_request(NewReviewRequest {
            id: Uuid::new_v4(),
            business_id: business.id,
            google_place_id: place_id,
            review_link,
            status: "sent".to_string(),
            provider_message_id: sent.message_id,
        })
        .await?;

    info!("Review request {} sent for business {}", saved.id, business.id);
    AuditLogger::log(
        AuditAction::ReviewRequestSent,
        &user.uid,
        "review_request",
        Some(saved.id.to_string()),
        Some(format!("business={}", business.id)),
    );

    Ok(Json(json!({ "ok": true })))
}
