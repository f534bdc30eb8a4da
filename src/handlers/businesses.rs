// Business profile handlers

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    models::UpsertBusinessRequest,
    utils::{ApiJson, ApiResult, AuditAction, AuditLogger},
};

/// The caller's own business, or null
/// GET /api/businesses/me
pub async fn get_my_business(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Value>> {
    let business = state.store.find_business_by_owner(&user.uid).await?;
    Ok(Json(json!({ "business": business })))
}

/// Create or update the caller's business
/// POST /api/businesses/upsert
#[instrument(skip(state, request), fields(uid = %user.uid))]
pub async fn upsert_business(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UpsertBusinessRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;

    let business = state
        .store
        .upsert_business(request.into_upsert(&user.uid))
        .await?;

    info!("Business {} saved for {}", business.id, user.uid);
    AuditLogger::log(
        AuditAction::BusinessUpserted,
        &user.uid,
        "business",
        Some(business.id.to_string()),
        None,
    );

    Ok(Json(json!({ "ok": true })))
}
