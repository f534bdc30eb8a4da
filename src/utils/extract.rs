// Request extractors whose rejections use the JSON error body

use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::utils::ApiError;

/// `axum::Json` with malformed or incomplete bodies rejected as 400
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with bad query strings rejected as 400
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Optional query number that reads unparseable input as absent,
/// so the handler applies its default.
pub fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}
