// Session and identity models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Claims carried by the HttpOnly `session` cookie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Identity provider uid (subject)
    pub sub: String,

    pub email: String,

    pub aud: String,

    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}

/// Verified identity from a provider ID token
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub id_token: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthEmailType {
    Verify,
    Reset,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(rename = "type")]
    pub kind: AuthEmailType,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub uid: String,
    pub email: String,
}
