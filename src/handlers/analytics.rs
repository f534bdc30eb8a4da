// Click analytics, revenue reports and the daily digest trigger

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    app::AppState,
    middleware::{
        auth::{header_value, CRON_TOKEN_HEADER},
        token_matches, AdminAccess, AuthenticatedUser,
    },
    services::{
        analytics::{
            self, DailySummary, Timeseries, DEFAULT_TIMESERIES_DAYS, MAX_TIMESERIES_DAYS,
        },
        SubscriberStats,
    },
    utils::{clamp_param, lenient_number, ApiError, ApiQuery, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct TimeseriesQuery {
    #[serde(default, deserialize_with = "lenient_number")]
    pub days: Option<i64>,
}

/// Per-channel daily clicks over the caller's businesses
/// GET /api/analytics/links/timeseries?days=
pub async fn link_timeseries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<TimeseriesQuery>,
) -> ApiResult<Json<Timeseries>> {
    let days = clamp_param(query.days, DEFAULT_TIMESERIES_DAYS, 1, MAX_TIMESERIES_DAYS);
    let series =
        analytics::link_timeseries(state.store.as_ref(), &user.uid, days, Utc::now()).await?;
    Ok(Json(series))
}

/// GET /api/analytics/summary
pub async fn daily_summary(
    State(state): State<AppState>,
    _admin: AdminAccess,
) -> ApiResult<Json<DailySummary>> {
    let summary =
        analytics::daily_summary(state.store.as_ref(), state.billing.as_ref(), Utc::now()).await?;
    Ok(Json(summary))
}

/// GET /api/analytics/subscribers
pub async fn subscribers(
    State(state): State<AppState>,
    _admin: AdminAccess,
) -> Json<SubscriberStats> {
    let stripe = &state.config.stripe;
    Json(
        analytics::subscriber_stats(
            state.billing.as_ref(),
            &stripe.price_id,
            stripe.yearly_price_id.as_deref(),
        )
        .await,
    )
}

/// Scheduler entry point for the daily owner digest
/// POST /api/digest/daily
pub async fn send_daily_digest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let provided = header_value(&headers, CRON_TOKEN_HEADER);
    if !token_matches(provided, state.config.admin.cron_digest_token.as_deref()) {
        return Err(ApiError::forbidden());
    }

    let sent =
        analytics::send_daily_digests(state.store.as_ref(), &state.email, Utc::now()).await?;
    info!("Daily digest run complete: {} sent", sent);

    Ok(Json(json!({ "ok": true, "sent": sent })))
}
