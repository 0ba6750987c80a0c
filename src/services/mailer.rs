use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::database::Document;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn from_document(user: &Document) -> Self {
        let field = |key: &str| user.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        Self { name: field("name"), email: field("email") }
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or_default()
    }
}

/// Outbound notifications. Delivery mechanics live behind this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<(), MailerError>;

    async fn send_password_reset(&self, to: &Recipient, reset_url: &str) -> Result<(), MailerError>;
}

/// Records deliveries in the log instead of sending them.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Default for LogMailer {
    fn default() -> Self {
        Self::new("Natours <hello@natours.io>")
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<(), MailerError> {
        info!(
            from = %self.from,
            to = %to.email,
            subject = "Welcome to the Natours Family!",
            "Welcome {}, visit {}",
            to.first_name(),
            url
        );
        Ok(())
    }

    async fn send_password_reset(&self, to: &Recipient, reset_url: &str) -> Result<(), MailerError> {
        info!(
            from = %self.from,
            to = %to.email,
            subject = "Your password reset token (valid for only 10 minutes)",
            "Forgot your password? Submit a PATCH request with your new password and passwordConfirm to {}",
            reset_url
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recipient_from_user_document() {
        let user = json!({"name": "Jonas Schmedtmann", "email": "jonas@example.com"});
        let recipient = Recipient::from_document(user.as_object().unwrap());
        assert_eq!(recipient.first_name(), "Jonas");
        assert_eq!(recipient.email, "jonas@example.com");
    }

    #[tokio::test]
    async fn log_mailer_always_delivers() {
        let recipient = Recipient { name: "Ana".into(), email: "ana@example.com".into() };
        let mailer = LogMailer::default();
        assert!(mailer.send_welcome(&recipient, "http://localhost/me").await.is_ok());
        assert!(mailer.send_password_reset(&recipient, "http://localhost/reset").await.is_ok());
    }
}
