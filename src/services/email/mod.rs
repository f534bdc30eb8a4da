// Email Service Module
// Orchestrates builders, the transport and the email log

pub mod builders;
pub mod sender;
pub mod types;

use self::types::EmailBuilder;
use crate::app_config::EmailConfig;
use crate::db::Store;
use crate::models::{AuthEmailType, NewEmailLogEntry};
use builders::{AuthActionEmailBuilder, InviteEmailBuilder, ReviewRequestEmailBuilder, TestEmailBuilder};
use handlebars::Handlebars;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub use sender::{EmailTransport, PostmarkSender};
pub use types::{EmailError, EmailMessage, SentEmail, TemplatedEmail};

/// Provider-side template alias for the daily click digest
pub const DAILY_DIGEST_TEMPLATE: &str = "daily-digest";

/// Per-channel click totals for the digest email
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DigestTotals {
    pub qr: i64,
    pub whatsapp: i64,
    pub sms: i64,
    pub email: i64,
    pub link: i64,
}

impl DigestTotals {
    pub fn total(&self) -> i64 {
        self.qr + self.whatsapp + self.sms + self.email + self.link
    }
}

/// Email service for sending the application's transactional email
#[derive(Clone)]
pub struct EmailService {
    transport: Arc<dyn EmailTransport>,
    store: Arc<dyn Store>,
    config: EmailConfig,
    app_url: String,
    templates: Arc<Handlebars<'static>>,
}

impl EmailService {
    pub fn new(
        config: EmailConfig,
        app_url: String,
        transport: Arc<dyn EmailTransport>,
        store: Arc<dyn Store>,
    ) -> Result<Self, EmailError> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(true);
        Self::register_templates(&mut templates)?;

        Ok(Self {
            transport,
            store,
            config,
            app_url,
            templates: Arc::new(templates),
        })
    }

    /// Postmark transport built from config
    pub fn postmark_transport(config: &EmailConfig) -> Arc<dyn EmailTransport> {
        Arc::new(
            PostmarkSender::new(
                config.postmark_server_token.clone(),
                config.postmark_api_url.clone(),
                config.message_stream.clone(),
            )
            .with_max_retries(3)
            .with_retry_delay(std::time::Duration::from_secs(1)),
        )
    }

    fn register_templates(templates: &mut Handlebars) -> Result<(), EmailError> {
        templates
            .register_partial("layout", include_str!("../../../templates/email/layout.html"))
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        let pages = [
            ("invite", include_str!("../../../templates/email/invite.html")),
            (
                "review_request",
                include_str!("../../../templates/email/review_request.html"),
            ),
            (
                "auth_action",
                include_str!("../../../templates/email/auth_action.html"),
            ),
            ("test", include_str!("../../../templates/email/test.html")),
        ];

        for (name, source) in pages {
            templates
                .register_template_string(name, source)
                .map_err(|e| EmailError::TemplateError(e.to_string()))?;
        }

        Ok(())
    }

    /// Send and record the outcome in the email log.
    /// Log write failures are logged, never surfaced.
    async fn deliver(&self, message: EmailMessage) -> Result<SentEmail, EmailError> {
        let to = message.to.clone();
        let tag = message.tag.clone();
        let subject = message.subject.clone();

        let result = self.transport.send(message).await;
        self.record(&to, &tag, &result, json!({ "subject": subject })).await;
        result
    }

    async fn record(
        &self,
        to: &str,
        template: &str,
        result: &Result<SentEmail, EmailError>,
        payload: serde_json::Value,
    ) {
        let (status, message_id, payload) = match result {
            Ok(sent) => ("sent", sent.message_id.clone(), payload),
            Err(e) => ("failed", None, json!({ "error": e.to_string(), "request": payload })),
        };

        let entry = NewEmailLogEntry {
            id: Uuid::new_v4(),
            provider: self.transport.provider_name().to_string(),
            to_email: to.to_string(),
            template: template.to_string(),
            status: status.to_string(),
            provider_message_id: message_id,
            payload: Some(payload),
        };

        if let Err(e) = self.store.insert_email_log(entry).await {
            warn!("Failed to record email log entry: {}", e);
        }
    }

    /// Send a team invite link
    #[instrument(skip(self))]
    pub async fn send_invite(
        &self,
        to_email: &str,
        business_name: &str,
        role: &str,
        accept_url: &str,
    ) -> Result<SentEmail, EmailError> {
        info!("Sending invite email to {}", to_email);

        let message = InviteEmailBuilder {
            to_email,
            business_name,
            role,
            accept_url,
            app_url: &self.app_url,
            config: &self.config,
            templates: &self.templates,
        }
        .build()?;

        self.deliver(message).await
    }

    /// Send a review request to a customer
    #[instrument(skip(self))]
    pub async fn send_review_request(
        &self,
        to_email: &str,
        customer_name: Option<&str>,
        business_name: &str,
        review_link: &str,
    ) -> Result<SentEmail, EmailError> {
        info!("Sending review request to {}", to_email);

        let message = ReviewRequestEmailBuilder {
            to_email,
            customer_name,
            business_name,
            review_link,
            app_url: &self.app_url,
            config: &self.config,
            templates: &self.templates,
        }
        .build()?;

        self.deliver(message).await
    }

    /// Send an email verification or password reset link
    #[instrument(skip(self, action_url))]
    pub async fn send_auth_action(
        &self,
        to_email: &str,
        kind: AuthEmailType,
        action_url: &str,
    ) -> Result<SentEmail, EmailError> {
        let message = AuthActionEmailBuilder {
            to_email,
            kind,
            action_url,
            app_url: &self.app_url,
            config: &self.config,
            templates: &self.templates,
        }
        .build()?;

        self.deliver(message).await
    }

    #[instrument(skip(self))]
    pub async fn send_test(&self, to_email: &str, message: &str) -> Result<SentEmail, EmailError> {
        let message = TestEmailBuilder {
            to_email,
            message,
            app_url: &self.app_url,
            config: &self.config,
            templates: &self.templates,
        }
        .build()?;

        self.deliver(message).await
    }

    /// Send the daily digest through the provider template
    #[instrument(skip(self))]
    pub async fn send_daily_digest(
        &self,
        to_email: &str,
        totals: &DigestTotals,
    ) -> Result<SentEmail, EmailError> {
        let model = json!({
            "product_name": self.config.product_name,
            "dashboard_url": format!("{}/dashboard", self.app_url),
            "qr": totals.qr,
            "whatsapp": totals.whatsapp,
            "sms": totals.sms,
            "email": totals.email,
            "link": totals.link,
            "total": totals.total(),
        });

        let email = TemplatedEmail {
            from: self.config.from_email.clone(),
            to: to_email.to_string(),
            template_alias: DAILY_DIGEST_TEMPLATE.to_string(),
            template_model: model.clone(),
        };

        let result = self.transport.send_template(email).await;
        self.record(to_email, DAILY_DIGEST_TEMPLATE, &result, model).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailTransport for RecordingTransport {
        async fn send(&self, message: EmailMessage) -> Result<SentEmail, EmailError> {
            self.sent.lock().await.push(message);
            Ok(SentEmail {
                message_id: Some("msg-1".to_string()),
            })
        }

        async fn send_template(&self, _email: TemplatedEmail) -> Result<SentEmail, EmailError> {
            Err(EmailError::ServiceUnavailable)
        }

        fn provider_name(&self) -> &'static str {
            "recording"
        }
    }

    fn create_test_config() -> EmailConfig {
        EmailConfig {
            postmark_server_token: "test-token".to_string(),
            postmark_api_url: "https://api.postmarkapp.com".to_string(),
            from_email: "hello@example.com".to_string(),
            product_name: "Reviews & Marketing".to_string(),
            message_stream: "outbound".to_string(),
        }
    }

    fn service() -> (EmailService, Arc<RecordingTransport>, Arc<MemoryStore>) {
        let transport = Arc::new(RecordingTransport::default());
        let store = Arc::new(MemoryStore::new());
        let service = EmailService::new(
            create_test_config(),
            "https://app.example.com".to_string(),
            transport.clone(),
            store.clone(),
        )
        .expect("templates should register");
        (service, transport, store)
    }

    #[tokio::test]
    async fn test_invite_email_renders_accept_link() {
        let (service, transport, store) = service();

        let sent = service
            .send_invite(
                "new@example.com",
                "Joe's Pizza",
                "member",
                "https://app.example.com/settings?accept=tok123",
            )
            .await
            .unwrap();
        assert_eq!(sent.message_id.as_deref(), Some("msg-1"));

        let messages = transport.sent.lock().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].html.contains("accept&#x3D;tok123"));
        assert!(messages[0]
            .text
            .as_deref()
            .unwrap_or_default()
            .contains("https://app.example.com/settings?accept=tok123"));
        assert!(messages[0].html.contains("Reviews &amp; Marketing"));
        assert_eq!(messages[0].tag, "invite");

        let log = store.list_email_log(10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, "sent");
        assert_eq!(log[0].provider, "recording");
    }

    #[tokio::test]
    async fn test_failed_digest_is_logged_as_failed() {
        let (service, _transport, store) = service();

        let result = service
            .send_daily_digest("owner@example.com", &DigestTotals::default())
            .await;
        assert!(result.is_err());

        let log = store.list_email_log(10).await.unwrap();
        assert_eq!(log[0].template, DAILY_DIGEST_TEMPLATE);
        assert_eq!(log[0].status, "failed");
    }

    #[test]
    fn test_digest_total() {
        let totals = DigestTotals {
            qr: 3,
            whatsapp: 1,
            sms: 0,
            email: 2,
            link: 4,
        };
        assert_eq!(totals.total(), 10);
    }
}
