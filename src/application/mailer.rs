//! Outbound mail seam.
//!
//! Mail is fire-and-forget from this layer's perspective: senders spawn the
//! delivery and a failed send is logged, never surfaced to the request that
//! triggered it.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body_html: String,
}

impl OutboundMail {
    pub fn account_verification(to: &str, full_name: &str, validation_url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Activate your account".to_string(),
            body_html: format!(
                "<p>Hello {full_name},</p>\
                 <p>Confirm your account by following \
                 <a href=\"{validation_url}\">this link</a>.</p>"
            ),
        }
    }

    pub fn password_reset(to: &str, full_name: &str, reset_url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            body_html: format!(
                "<p>Hello {full_name},</p>\
                 <p>Reset your password by following \
                 <a href=\"{reset_url}\">this link</a>. \
                 The link expires in 15 minutes.</p>"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError>;
}

/// Mailer used when no delivery endpoint is configured. Logs and discards.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        debug!(
            target: "portico::mail",
            to = %mail.to,
            subject = %mail.subject,
            "mail delivery disabled, discarding message"
        );
        Ok(())
    }
}
