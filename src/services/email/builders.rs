// Email Builders - one builder per branded email

use super::types::{
    AuthActionEmailData, BrandData, EmailBuilder, EmailError, EmailMessage, InviteEmailData,
    ReviewRequestEmailData, TestEmailData,
};
use crate::app_config::EmailConfig;
use crate::models::AuthEmailType;
use handlebars::Handlebars;
use tracing::instrument;

fn brand(config: &EmailConfig, app_url: &str, title: &str) -> BrandData {
    BrandData {
        product_name: config.product_name.clone(),
        app_url: app_url.to_string(),
        title: title.to_string(),
    }
}

fn render<T: serde::Serialize>(
    templates: &Handlebars<'_>,
    name: &str,
    data: &T,
) -> Result<String, EmailError> {
    templates
        .render(name, data)
        .map_err(|e| EmailError::TemplateError(e.to_string()))
}

/// Team invite with an accept link
pub struct InviteEmailBuilder<'a> {
    pub to_email: &'a str,
    pub business_name: &'a str,
    pub role: &'a str,
    pub accept_url: &'a str,
    pub app_url: &'a str,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for InviteEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let subject = format!(
            "You're invited to {} on {}",
            self.business_name, self.config.product_name
        );
        let data = InviteEmailData {
            brand: brand(self.config, self.app_url, &subject),
            business_name: self.business_name.to_string(),
            role: self.role.to_string(),
            accept_url: self.accept_url.to_string(),
        };

        let html = render(self.templates, "invite", &data)?;
        let text = format!(
            "You've been invited to join {} on {} as {}.\n\nAccept: {}",
            self.business_name, self.config.product_name, self.role, self.accept_url
        );

        Ok(EmailMessage::new(
            self.config.from_email.clone(),
            self.to_email.to_string(),
            subject,
            html,
            "invite",
        )
        .with_text(text))
    }
}

/// Review request sent to a business's customer
pub struct ReviewRequestEmailBuilder<'a> {
    pub to_email: &'a str,
    pub customer_name: Option<&'a str>,
    pub business_name: &'a str,
    pub review_link: &'a str,
    pub app_url: &'a str,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for ReviewRequestEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let subject = "Quick review request".to_string();
        let customer_name = self.customer_name.unwrap_or("there").to_string();
        let data = ReviewRequestEmailData {
            brand: brand(self.config, self.app_url, &subject),
            customer_name: customer_name.clone(),
            business_name: self.business_name.to_string(),
            review_link: self.review_link.to_string(),
        };

        let html = render(self.templates, "review_request", &data)?;
        let text = format!(
            "Hi {},\n\nPlease leave a quick review for {}: {}",
            customer_name, self.business_name, self.review_link
        );

        Ok(EmailMessage::new(
            self.config.from_email.clone(),
            self.to_email.to_string(),
            subject,
            html,
            "review_request",
        )
        .with_text(text))
    }
}

/// Email verification or password reset with a provider action link
pub struct AuthActionEmailBuilder<'a> {
    pub to_email: &'a str,
    pub kind: AuthEmailType,
    pub action_url: &'a str,
    pub app_url: &'a str,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for AuthActionEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let (subject, intro, label, tag) = match self.kind {
            AuthEmailType::Verify => (
                format!("Verify your email for {}", self.config.product_name),
                "Confirm your email address to finish setting up your account.",
                "Verify email",
                "verify_email",
            ),
            AuthEmailType::Reset => (
                format!("Reset your {} password", self.config.product_name),
                "We received a request to reset your password.",
                "Reset password",
                "password_reset",
            ),
        };

        let data = AuthActionEmailData {
            brand: brand(self.config, self.app_url, &subject),
            intro: intro.to_string(),
            action_label: label.to_string(),
            action_url: self.action_url.to_string(),
        };

        let html = render(self.templates, "auth_action", &data)?;
        let text = format!("{}\n\n{}: {}", intro, label, self.action_url);

        Ok(EmailMessage::new(
            self.config.from_email.clone(),
            self.to_email.to_string(),
            subject,
            html,
            tag,
        )
        .with_text(text))
    }
}

/// Operator test email
pub struct TestEmailBuilder<'a> {
    pub to_email: &'a str,
    pub message: &'a str,
    pub app_url: &'a str,
    pub config: &'a EmailConfig,
    pub templates: &'a Handlebars<'a>,
}

impl<'a> EmailBuilder for TestEmailBuilder<'a> {
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let subject = format!("{} test email", self.config.product_name);
        let data = TestEmailData {
            brand: brand(self.config, self.app_url, &subject),
            message: self.message.to_string(),
        };

        let html = render(self.templates, "test", &data)?;

        Ok(EmailMessage::new(
            self.config.from_email.clone(),
            self.to_email.to_string(),
            subject,
            html,
            "test",
        )
        .with_text(self.message.to_string()))
    }
}
