// Identity provider integration
//
// Verifies Firebase-style ID tokens (RS256, keys from the provider JWKS)
// and requests out-of-band action links for verification and password
// reset emails.

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::app_config::IdentityConfig;
use crate::models::{AuthEmailType, VerifiedIdentity};

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid ID token: {0}")]
    InvalidToken(String),

    #[error("Signing key not found")]
    UnknownKey,

    #[error("Identity provider request failed: {0}")]
    Upstream(String),

    #[error("Identity provider not configured: {0}")]
    NotConfigured(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;

    /// Provider-hosted link that verifies an email or resets a password
    async fn generate_action_link(
        &self,
        email: &str,
        kind: AuthEmailType,
    ) -> Result<String, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeResponse {
    oob_link: Option<String>,
}

pub struct FirebaseIdentity {
    client: Client,
    config: IdentityConfig,
    keys: RwLock<Option<(Instant, JwkSet)>>,
}

impl FirebaseIdentity {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            keys: RwLock::new(None),
        }
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.config.project_id)
    }

    async fn fetch_keys(&self) -> Result<JwkSet, IdentityError> {
        debug!("Fetching identity provider signing keys");
        let response = self
            .client
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "JWKS request failed with status {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))
    }

    /// Decoding key for `kid`, refreshing the cached set when stale or missing the key
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cached = self.keys.read().await;
            if let Some((fetched_at, set)) = cached.as_ref() {
                if fetched_at.elapsed() < JWKS_CACHE_TTL {
                    if let Some(jwk) = set.find(kid) {
                        return DecodingKey::from_jwk(jwk)
                            .map_err(|e| IdentityError::InvalidToken(e.to_string()));
                    }
                }
            }
        }

        let set = self.fetch_keys().await?;
        let key = match set.find(kid) {
            Some(jwk) => {
                DecodingKey::from_jwk(jwk).map_err(|e| IdentityError::InvalidToken(e.to_string()))?
            },
            None => return Err(IdentityError::UnknownKey),
        };
        *self.keys.write().await = Some((Instant::now(), set));
        Ok(key)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    #[instrument(skip(self, id_token))]
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header =
            decode_header(id_token).map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::InvalidToken("unexpected algorithm".to_string()));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("missing kid".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.project_id]);
        validation.set_issuer(&[self.issuer()]);

        let data = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(IdentityError::InvalidToken("empty subject".to_string()));
        }

        Ok(VerifiedIdentity {
            uid: data.claims.sub,
            email: data.claims.email,
        })
    }

    #[instrument(skip(self))]
    async fn generate_action_link(
        &self,
        email: &str,
        kind: AuthEmailType,
    ) -> Result<String, IdentityError> {
        let access_token = self.config.admin_access_token.as_deref().ok_or_else(|| {
            IdentityError::NotConfigured("IDENTITY_ADMIN_ACCESS_TOKEN is not set".to_string())
        })?;

        let request_type = match kind {
            AuthEmailType::Verify => "VERIFY_EMAIL",
            AuthEmailType::Reset => "PASSWORD_RESET",
        };

        let url = format!(
            "{}/projects/{}/accounts:sendOobCode",
            self.config.api_base_url, self.config.project_id
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&json!({
                "requestType": request_type,
                "email": email,
                "returnOobLink": true,
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Action link request failed: {} {}", status, body);
            return Err(IdentityError::Upstream(format!("status {}: {}", status, body)));
        }

        let body: OobCodeResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        body.oob_link
            .ok_or_else(|| IdentityError::Upstream("response had no oobLink".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> FirebaseIdentity {
        FirebaseIdentity::new(IdentityConfig {
            project_id: "reviews-test".to_string(),
            jwks_url: "http://127.0.0.1:9/jwks".to_string(),
            api_base_url: "http://127.0.0.1:9/v1".to_string(),
            web_api_key: None,
            admin_access_token: None,
        })
    }

    #[test]
    fn test_issuer_uses_project_id() {
        assert_eq!(identity().issuer(), "https://securetoken.google.com/reviews-test");
    }

    #[tokio::test]
    async fn test_malformed_token_rejected_before_key_fetch() {
        let result = identity().verify_id_token("garbage").await;
        assert!(matches!(result, Err(IdentityError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_action_link_requires_admin_token() {
        let result = identity()
            .generate_action_link("a@example.com", AuthEmailType::Reset)
            .await;
        assert!(matches!(result, Err(IdentityError::NotConfigured(_))));
    }
}
