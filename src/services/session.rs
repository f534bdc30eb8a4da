// Session token service
// HS256 tokens carried in the HttpOnly session cookie

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::app_config::SessionConfig;
use crate::models::SessionClaims;

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("JWT encoding error: {0}")]
    EncodingError(String),

    #[error("Session expired")]
    Expired,

    #[error("Invalid session")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => SessionError::Invalid,
            _ => SessionError::EncodingError(err.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    cookie_name: String,
    default_days: i64,
    max_days: i64,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("cookie_name", &self.cookie_name)
            .field("encoding_key", &"<redacted>")
            .field("decoding_key", &"<redacted>")
            .finish()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl SessionService {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            cookie_name: config.cookie_name.clone(),
            default_days: config.default_days,
            max_days: config.max_days,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Session lifetime in days: default when absent, clamped to `1..=max_days`
    pub fn clamp_days(&self, requested: Option<i64>) -> i64 {
        requested.unwrap_or(self.default_days).clamp(1, self.max_days)
    }

    /// Mint a session token valid for `days`
    pub fn issue(&self, uid: &str, email: &str, days: i64) -> Result<String, SessionError> {
        let iat = now_secs();
        let claims = SessionClaims {
            sub: uid.to_string(),
            email: email.to_string(),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            iat,
            exp: iat + (days.max(1) as u64) * 86_400,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::EncodingError(e.to_string()))
    }

    /// Validate signature, audience, issuer and expiry
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
