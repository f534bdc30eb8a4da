// Session and account email handlers

use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::{json, Value};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    models::{normalize_email, AuthEmailRequest, CreateSessionRequest, MeResponse, NewUser},
    utils::{ApiError, ApiJson, ApiResult, AuditAction, AuditLogger},
};

fn session_cookie(name: &str, value: String, days: i64) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(days))
        .build()
}

/// Exchange a provider ID token for a session cookie
/// POST /api/auth/session
#[instrument(skip(state, jar, request))]
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<CreateSessionRequest>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let id_token = request
        .id_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing idToken"))?;

    let identity = state.identity.verify_id_token(id_token.trim()).await?;
    let days = state.sessions.clamp_days(request.days);

    if let Some(email) = identity.email.as_deref() {
        state
            .store
            .upsert_user(NewUser::new(identity.uid.clone(), email))
            .await?;
    }

    let email = identity.email.as_deref().map(normalize_email).unwrap_or_default();
    let token = state.sessions.issue(&identity.uid, &email, days)?;

    info!("Session created for {} ({} days)", identity.uid, days);
    AuditLogger::log(
        AuditAction::SessionCreated,
        &identity.uid,
        "session",
        None,
        Some(format!("days={}", days)),
    );

    let jar = jar.add(session_cookie(state.sessions.cookie_name(), token, days));
    Ok((jar, Json(json!({ "ok": true }))))
}

/// Clear the session cookie
/// DELETE /api/auth/session
pub async fn delete_session(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    let cookie = Cookie::build((state.sessions.cookie_name().to_string(), ""))
        .path("/")
        .build();
    (jar.remove(cookie), Json(json!({ "ok": true })))
}

/// GET /api/auth/me
pub async fn me(user: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        uid: user.uid,
        email: user.email.unwrap_or_default(),
    })
}

/// Email a provider verification or password reset link
/// POST /api/auth/email
#[instrument(skip(state, request), fields(kind = ?request.kind))]
pub async fn send_auth_email(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AuthEmailRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;
    let email = normalize_email(&request.email);

    let link = state.identity.generate_action_link(&email, request.kind).await?;
    let sent = state.email.send_auth_action(&email, request.kind, &link).await?;

    Ok(Json(json!({ "ok": true, "id": sent.message_id })))
}
