//! HTTP mail delivery.
//!
//! Posts rendered messages as JSON to a configured relay endpoint. The
//! application layer treats delivery as fire-and-forget, so this adapter only
//! needs to report success or a describable failure.

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::application::mailer::{MailError, Mailer, OutboundMail};

#[derive(Debug, Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    from_name: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
    from: String,
    from_name: String,
}

impl HttpMailer {
    pub fn new(endpoint: Url, from: String, from_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            from,
            from_name,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        let payload = MailPayload {
            from: &self.from,
            from_name: &self.from_name,
            to: &mail.to,
            subject: &mail.subject,
            html: &mail.body_html,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| MailError::Delivery(err.to_string()))?;

        if !response.status().is_success() {
            return Err(MailError::Delivery(format!(
                "relay returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
