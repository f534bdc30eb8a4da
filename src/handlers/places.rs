// Places search and static map proxy

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::{
    app::AppState,
    services::places::{
        PlaceDetails, StaticMapParams, PLACEHOLDER_CACHE_CONTROL, STATIC_MAP_CACHE_CONTROL,
    },
    utils::{lenient_number, ApiError, ApiJson, ApiQuery, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct StaticMapQuery {
    #[serde(default, deserialize_with = "lenient_number")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub zoom: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub w: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub h: Option<f64>,
}

/// Static map PNG, or a placeholder SVG when the upstream fails
/// GET /api/maps/static?lat=&lng=&zoom=&w=&h=
pub async fn static_map(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StaticMapQuery>,
) -> ApiResult<Response> {
    let (Some(lat), Some(lng)) = (query.lat, query.lng) else {
        return Err(ApiError::bad_request("Missing lat/lng"));
    };
    let params = StaticMapParams::new(lat, lng, query.zoom, query.w, query.h)
        .ok_or_else(|| ApiError::bad_request("Invalid lat/lng"))?;

    match state.places.static_map(&params).await {
        Ok(png) => Ok((
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, STATIC_MAP_CACHE_CONTROL),
            ],
            png,
        )
            .into_response()),
        Err(e) => {
            warn!("Static map failed, serving placeholder: {}", e);
            Ok((
                [
                    (header::CONTENT_TYPE, "image/svg+xml"),
                    (header::CACHE_CONTROL, PLACEHOLDER_CACHE_CONTROL),
                ],
                params.placeholder_svg(),
            )
                .into_response())
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteRequest {
    #[serde(default)]
    pub input: String,
    pub session_token: Option<String>,
    pub included_region_codes: Option<Vec<String>>,
}

/// POST /api/places/autocomplete
pub async fn autocomplete(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AutocompleteRequest>,
) -> ApiResult<Json<Value>> {
    let input = request.input.trim();
    if input.is_empty() {
        return Ok(Json(json!({ "items": [] })));
    }

    let region_codes = request
        .included_region_codes
        .filter(|codes| !codes.is_empty())
        .unwrap_or_else(|| state.places.default_region_codes());

    let items = state
        .places
        .autocomplete(input, request.session_token.as_deref(), region_codes)
        .await?;

    Ok(Json(json!({ "items": items })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetailsQuery {
    pub place_id: Option<String>,
}

/// GET /api/places/details?placeId=
pub async fn place_details(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PlaceDetailsQuery>,
) -> ApiResult<Json<PlaceDetails>> {
    let place_id = query
        .place_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing placeId"))?;

    Ok(Json(state.places.details(place_id).await?))
}
