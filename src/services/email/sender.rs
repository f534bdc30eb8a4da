// Email Sender - delivery through the Postmark HTTP API

use super::types::{
    EmailError, EmailMessage, PostmarkEmailPayload, PostmarkResponse, PostmarkTemplatePayload,
    SentEmail, TemplatedEmail,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Outbound email transport
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<SentEmail, EmailError>;

    async fn send_template(&self, email: TemplatedEmail) -> Result<SentEmail, EmailError>;

    fn provider_name(&self) -> &'static str;
}

/// Postmark sender with bounded retry
#[derive(Clone)]
pub struct PostmarkSender {
    client: Arc<Client>,
    server_token: String,
    api_url: String,
    message_stream: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl PostmarkSender {
    pub fn new(server_token: String, api_url: String, message_stream: String) -> Self {
        Self {
            client: Arc::new(Client::new()),
            server_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            message_stream,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Set maximum retry attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set delay between retries
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn post_once<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<SentEmail, EmailError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_url, path))
            .header("X-Postmark-Server-Token", &self.server_token)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                let body: PostmarkResponse = res
                    .json()
                    .await
                    .map_err(|e| EmailError::SendError(format!("Invalid provider response: {}", e)))?;

                if body.error_code != 0 {
                    return Err(EmailError::SendError(
                        body.message.unwrap_or_else(|| format!("error code {}", body.error_code)),
                    ));
                }

                info!("Email sent successfully");
                Ok(SentEmail {
                    message_id: body.message_id,
                })
            },
            Ok(res) => {
                let status = res.status();
                let error_text = res
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());

                error!(
                    "Failed to send email. Status: {}, Error: {}",
                    status, error_text
                );

                if status.as_u16() == 429 {
                    Err(EmailError::RateLimitExceeded)
                } else if status.is_server_error() {
                    Err(EmailError::ServiceUnavailable)
                } else if status.as_u16() == 422 && error_text.contains("'To' address") {
                    Err(EmailError::InvalidEmail(error_text))
                } else {
                    Err(EmailError::SendError(format!(
                        "Email send failed with status {}: {}",
                        status, error_text
                    )))
                }
            },
            Err(e) => {
                error!("Network error while sending email: {:?}", e);
                Err(EmailError::SendError(format!("Network error: {}", e)))
            },
        }
    }

    /// Retry transient failures with exponential backoff and jitter.
    /// Rate limits and rejected addresses are returned immediately.
    async fn post_with_retry<T: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<SentEmail, EmailError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.post_once(path, payload).await {
                Ok(sent) => return Ok(sent),
                Err(e @ (EmailError::RateLimitExceeded | EmailError::InvalidEmail(_))) => {
                    warn!("Email rejected, not retrying: {}", e);
                    return Err(e);
                },
                Err(e) => {
                    warn!("Email send attempt {} failed: {:?}", attempt, e);
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        let delay = self.backoff_delay(attempt);
                        info!("Retrying in {:?} (with jitter)", delay);
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            EmailError::SendError("Failed after maximum retry attempts".to_string())
        }))
    }

    /// Exponential delay capped at 60s plus 0-25% jitter
    fn backoff_delay(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let max_delay = Duration::from_secs(60);
        let exp = 2_u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let base_delay = self
            .retry_delay
            .checked_mul(exp)
            .unwrap_or(max_delay)
            .min(max_delay);

        let jitter_millis = rand::thread_rng().gen_range(0..=(base_delay.as_millis() / 4) as u64);
        base_delay + Duration::from_millis(jitter_millis)
    }
}

#[async_trait]
impl EmailTransport for PostmarkSender {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> Result<SentEmail, EmailError> {
        let payload = PostmarkEmailPayload::from_message(message, &self.message_stream);
        self.post_with_retry("/email", &payload).await
    }

    #[instrument(skip(self, email), fields(to = %email.to, template = %email.template_alias))]
    async fn send_template(&self, email: TemplatedEmail) -> Result<SentEmail, EmailError> {
        let payload = PostmarkTemplatePayload {
            from: email.from,
            to: email.to,
            template_alias: email.template_alias,
            template_model: email.template_model,
            message_stream: self.message_stream.clone(),
        };
        self.post_with_retry("/email/withTemplate", &payload).await
    }

    fn provider_name(&self) -> &'static str {
        "postmark"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> PostmarkSender {
        PostmarkSender::new(
            "test-token".to_string(),
            "https://api.postmarkapp.com/".to_string(),
            "outbound".to_string(),
        )
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        assert_eq!(sender().api_url, "https://api.postmarkapp.com");
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let sender = sender().with_retry_delay(Duration::from_millis(100));

        let first = sender.backoff_delay(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));

        let third = sender.backoff_delay(3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));

        let huge = sender.backoff_delay(50);
        assert!(huge >= Duration::from_secs(60) && huge <= Duration::from_secs(75));
    }

    #[test]
    fn test_max_retries_at_least_one() {
        assert_eq!(sender().with_max_retries(0).max_retries, 1);
    }
}
