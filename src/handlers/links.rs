// Channel short links and the public redirect

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    app::AppState,
    handlers::members::BusinessIdQuery,
    middleware::AuthenticatedUser,
    models::{Channel, CreateShortLinkRequest, ShortLinkResponse},
    utils::{ApiJson, ApiQuery, ApiResult},
};

/// Create a short link for a channel
/// POST /api/links
pub async fn create_link(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateShortLinkRequest>,
) -> ApiResult<Json<ShortLinkResponse>> {
    let channel = request
        .channel
        .as_deref()
        .map(Channel::from_string)
        .unwrap_or(Channel::Link);

    let link = state
        .links
        .create(&user.uid, request.business_id, channel)
        .await?;
    Ok(Json(link))
}

/// GET /api/links?businessId=
pub async fn list_links(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<BusinessIdQuery>,
) -> ApiResult<Json<Value>> {
    let business_id = query.parse()?;
    let links = state.links.list(&user.uid, business_id).await?;
    Ok(Json(json!({ "links": links })))
}

/// Record the click and send the visitor to the review page
/// GET /r/{slug}
#[instrument(skip(state))]
pub async fn redirect_short_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Response> {
    let target = state.links.resolve_redirect(&slug).await?;

    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, target),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response())
}
