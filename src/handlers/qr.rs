// QR code image endpoint

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    services::{
        entitlements::has_active_pro,
        qr::{self, QrFormat, DEFAULT_MARGIN, DEFAULT_SCALE, MAX_MARGIN, MAX_SCALE},
    },
    utils::{clamp_param, lenient_number, ApiError, ApiQuery, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct QrParams {
    pub data: Option<String>,
    pub format: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub scale: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub margin: Option<i64>,
}

/// Render a QR code. Starter accounts may only encode their saved review link.
/// GET /api/qr?data=&format=&scale=&margin=
#[instrument(skip(state, params), fields(uid = %user.uid))]
pub async fn generate_qr(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<QrParams>,
) -> ApiResult<impl IntoResponse> {
    let data = params
        .data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing data"))?;

    if !has_active_pro(state.store.as_ref(), &user.uid).await? {
        let saved_link = state
            .store
            .find_business_by_owner(&user.uid)
            .await?
            .and_then(|b| b.review_link);

        if saved_link.as_deref() != Some(data.as_str()) {
            debug!("Starter QR request for data other than the saved review link");
            return Err(ApiError::Forbidden(
                "Custom QR codes require a Pro subscription".to_string(),
            ));
        }
    }

    let format = QrFormat::from_param(params.format.as_deref());
    let scale = clamp_param(params.scale, DEFAULT_SCALE, 1, MAX_SCALE) as u32;
    let margin = clamp_param(params.margin, DEFAULT_MARGIN, 0, MAX_MARGIN) as u32;

    let (bytes, content_type) = qr::render(&data, format, scale, margin)?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        bytes,
    ))
}
