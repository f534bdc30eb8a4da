// Health check and public contact form

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;

use crate::{
    app::AppState,
    utils::{trim_and_validate_field, ApiError, ApiJson},
};

/// Build info plus store connectivity
/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let started = Instant::now();
    let database = match state.store.health_check().await {
        Ok(()) => json!({
            "status": "healthy",
            "backend": state.store.backend_name(),
            "latency_ms": started.elapsed().as_millis() as u64,
            "error": null
        }),
        Err(e) => json!({
            "status": "unhealthy",
            "backend": state.store.backend_name(),
            "error": e.to_string()
        }),
    };
    let healthy = database["status"] == "healthy";

    let body = json!({
        "status": if healthy { "ok" } else { "degraded" },
        "sha": state.config.server.git_sha,
        "deployedAt": state.config.server.deployed_at,
        "components": { "database": database }
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

/// POST /api/contact
pub async fn contact(ApiJson(request): ApiJson<ContactRequest>) -> Result<Json<Value>, ApiError> {
    let field = |value: &Option<String>| {
        trim_and_validate_field(value.as_deref().unwrap_or_default(), true)
            .map_err(|_| ApiError::bad_request("Missing fields"))
    };
    let name = field(&request.name)?;
    let email = field(&request.email)?;
    let message = field(&request.message)?;

    info!(target: "contact", name = %name, email = %email, "{}", message);

    Ok(Json(json!({ "ok": true })))
}
