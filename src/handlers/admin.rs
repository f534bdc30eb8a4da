// Operator endpoints behind the admin token

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument};
use validator::Validate;

use crate::{
    app::AppState,
    middleware::{
        auth::{header_value, ADMIN_TOKEN_HEADER},
        token_matches, AdminAccess,
    },
    models::{normalize_email, FEATURE_FLAGS_KEY, NO_SUBSCRIPTION_STATUS},
    services::entitlements::plan_status,
    utils::{clamp_param, lenient_number, ApiError, ApiJson, ApiQuery, ApiResult, AuditAction, AuditLogger},
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;
const MAX_SUBSCRIPTIONS: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default, deserialize_with = "lenient_number")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub offset: Option<i64>,
}

/// GET /api/admin/users/list?limit=&offset=
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminAccess,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_param(query.limit, DEFAULT_PAGE_SIZE, 1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let users = state.store.list_users(limit, offset).await?;
    Ok(Json(json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub email: Option<String>,
}

/// Plan status for a user looked up by email
/// GET /api/admin/plan?email=
pub async fn user_plan(
    State(state): State<AppState>,
    _admin: AdminAccess,
    ApiQuery(query): ApiQuery<PlanQuery>,
) -> ApiResult<Json<Value>> {
    let email = query
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing email"))?;

    let status = match state.store.find_user_by_email(&email).await? {
        Some(user) => plan_status(state.store.as_ref(), &user.uid).await?,
        None => NO_SUBSCRIPTION_STATUS.to_string(),
    };

    Ok(Json(json!({ "email": email, "status": status })))
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionsQuery {
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub limit: Option<i64>,
}

/// GET /api/admin/subscriptions/list?status=
pub async fn list_subscriptions(
    State(state): State<AppState>,
    _admin: AdminAccess,
    ApiQuery(query): ApiQuery<SubscriptionsQuery>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_param(query.limit, MAX_SUBSCRIPTIONS, 1, MAX_SUBSCRIPTIONS);
    let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let subscriptions = state.store.list_subscriptions(status, limit).await?;
    Ok(Json(json!({ "subscriptions": subscriptions })))
}

/// GET /api/admin/email/log?limit=
pub async fn email_log(
    State(state): State<AppState>,
    _admin: AdminAccess,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_param(query.limit, DEFAULT_PAGE_SIZE, 1, MAX_PAGE_SIZE);
    let emails = state.store.list_email_log(limit).await?;
    Ok(Json(json!({ "emails": emails })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendTestEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub title: Option<String>,
    pub intro: Option<String>,
    pub url: Option<String>,
}

impl SendTestEmailRequest {
    fn message(&self) -> String {
        let parts: Vec<&str> = [&self.title, &self.intro, &self.url]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim))
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            "This is a test email.".to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

/// POST /api/admin/email/send-test
#[instrument(skip(state, request))]
pub async fn send_test_email(
    State(state): State<AppState>,
    _admin: AdminAccess,
    ApiJson(request): ApiJson<SendTestEmailRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;
    let to = normalize_email(&request.email);

    state.email.send_test(&to, &request.message()).await?;
    AuditLogger::log(AuditAction::AdminTestEmailSent, "admin", "email", None, Some(to));

    Ok(Json(json!({ "ok": true })))
}

/// GET /api/admin/features
pub async fn get_features(
    State(state): State<AppState>,
    _admin: AdminAccess,
) -> ApiResult<Json<Value>> {
    let flags = state
        .store
        .get_setting(FEATURE_FLAGS_KEY)
        .await?
        .unwrap_or_else(|| json!({}));
    Ok(Json(json!({ "flags": flags })))
}

/// POST /api/admin/features
pub async fn put_features(
    State(state): State<AppState>,
    _admin: AdminAccess,
    ApiJson(flags): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    if !flags.is_object() {
        return Err(ApiError::bad_request("Feature flags must be a JSON object"));
    }

    state.store.put_setting(FEATURE_FLAGS_KEY, flags).await?;
    AuditLogger::log(
        AuditAction::AdminFeaturesUpdated,
        "admin",
        "app_setting",
        Some(FEATURE_FLAGS_KEY.to_string()),
        None,
    );

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct MigrateQuery {
    pub token: Option<String>,
}

/// Apply pending migrations; guarded by the one-off migrations token
/// POST /api/admin/migrate
pub async fn run_migrations(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<MigrateQuery>,
) -> ApiResult<Json<Value>> {
    let provided = header_value(&headers, ADMIN_TOKEN_HEADER).or(query.token.as_deref());
    if !token_matches(provided, state.config.admin.migrations_token.as_deref()) {
        return Err(ApiError::forbidden());
    }

    let ran = state.store.run_migrations().await.map_err(|e| {
        error!("Migration run failed: {}", e);
        ApiError::Internal(format!("migration failed: {}", e))
    })?;

    info!("Applied {} migrations", ran.len());
    AuditLogger::log(
        AuditAction::MigrationsRun,
        "admin",
        "schema",
        None,
        Some(ran.join(",")),
    );

    Ok(Json(json!({ "ok": true, "ran": ran })))
}
