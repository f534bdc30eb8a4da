// Request authentication extractors.
// Session cookie first, then `Authorization: Bearer <provider ID token>`.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::{app::AppState, utils::ApiError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
pub const CRON_TOKEN_HEADER: &str = "x-cron-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSource {
    SessionCookie,
    BearerToken,
}

/// Caller identity resolved for a request
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: Option<String>,
    pub source: AuthSource,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        if let Some(cookie) = jar.get(state.sessions.cookie_name()) {
            match state.sessions.verify(cookie.value()) {
                Ok(claims) => {
                    return Ok(AuthenticatedUser {
                        uid: claims.sub,
                        email: Some(claims.email).filter(|e| !e.is_empty()),
                        source: AuthSource::SessionCookie,
                    });
                },
                Err(e) => debug!("Session cookie rejected: {}", e),
            }
        }

        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let identity = state.identity.verify_id_token(token).await.map_err(|e| {
            debug!("Bearer token rejected: {}", e);
            ApiError::Unauthorized
        })?;

        Ok(AuthenticatedUser {
            uid: identity.uid,
            email: identity.email,
            source: AuthSource::BearerToken,
        })
    }
}

/// Constant-time token check. An unset expected token never matches.
pub fn token_matches(provided: Option<&str>, expected: Option<&str>) -> bool {
    match (provided, expected) {
        (Some(provided), Some(expected)) if !expected.is_empty() => {
            provided.as_bytes().ct_eq(expected.as_bytes()).into()
        },
        _ => false,
    }
}

pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Operator access via the `x-admin-token` header
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let provided = header_value(&parts.headers, ADMIN_TOKEN_HEADER);
        if token_matches(provided, state.config.admin.admin_token.as_deref()) {
            Ok(AdminAccess)
        } else {
            Err(ApiError::forbidden())
        }
    }
}
