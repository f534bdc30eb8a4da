// Email Service Types - Shared types and structures for email module

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors that can occur during email operations
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendError(String),

    #[error("Template rendering error: {0}")]
    TemplateError(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable")]
    ServiceUnavailable,
}

/// A rendered email ready for the provider
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
    /// Template name recorded in the email log
    pub tag: String,
}

impl EmailMessage {
    pub fn new(from: String, to: String, subject: String, html: String, tag: &str) -> Self {
        Self {
            from,
            to,
            subject,
            html,
            text: None,
            tag: tag.to_string(),
        }
    }

    pub fn with_text(mut self, text: String) -> Self {
        self.text = Some(text);
        self
    }
}

/// An email rendered by a provider-side template
#[derive(Debug, Clone, Serialize)]
pub struct TemplatedEmail {
    pub from: String,
    pub to: String,
    pub template_alias: String,
    pub template_model: JsonValue,
}

/// Provider acknowledgement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentEmail {
    pub message_id: Option<String>,
}

/// Trait that all email builders must implement
pub trait EmailBuilder {
    fn build(&self) -> Result<EmailMessage, EmailError>;
}

/// Fields shared by every branded template
#[derive(Serialize)]
pub struct BrandData {
    pub product_name: String,
    pub app_url: String,
    pub title: String,
}

#[derive(Serialize)]
pub struct InviteEmailData {
    #[serde(flatten)]
    pub brand: BrandData,
    pub business_name: String,
    pub role: String,
    pub accept_url: String,
}

#[derive(Serialize)]
pub struct ReviewRequestEmailData {
    #[serde(flatten)]
    pub brand: BrandData,
    pub customer_name: String,
    pub business_name: String,
    pub review_link: String,
}

#[derive(Serialize)]
pub struct AuthActionEmailData {
    #[serde(flatten)]
    pub brand: BrandData,
    pub intro: String,
    pub action_label: String,
    pub action_url: String,
}

#[derive(Serialize)]
pub struct TestEmailData {
    #[serde(flatten)]
    pub brand: BrandData,
    pub message: String,
}

/// Postmark `/email` payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostmarkEmailPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    pub tag: String,
    pub message_stream: String,
}

impl PostmarkEmailPayload {
    pub fn from_message(message: EmailMessage, message_stream: &str) -> Self {
        Self {
            from: message.from,
            to: message.to,
            subject: message.subject,
            html_body: message.html,
            text_body: message.text,
            tag: message.tag,
            message_stream: message_stream.to_string(),
        }
    }
}

/// Postmark `/email/withTemplate` payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostmarkTemplatePayload {
    pub from: String,
    pub to: String,
    pub template_alias: String,
    pub template_model: JsonValue,
    pub message_stream: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostmarkResponse {
    #[serde(rename = "MessageID")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub message: Option<String>,
}
