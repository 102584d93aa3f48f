// Mail transport
//
// `HttpMailRelay` posts messages to a transactional mail relay over HTTPS.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// A single outgoing email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Trait for mail transports
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message. Errors are reported to the caller, never retried here.
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Transport name for logs
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// HTTP mail relay client
#[derive(Clone)]
pub struct HttpMailRelay {
    client: Client,
    endpoint: String,
    token: Option<String>,
    sender: String,
}

impl HttpMailRelay {
    pub fn new(endpoint: impl Into<String>, sender: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: None,
            sender: sender.into(),
        })
    }

    /// Bearer token sent with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl MailTransport for HttpMailRelay {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = RelayPayload {
            from: &self.sender,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach mail relay")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Mail relay rejected message\n\nStatus: {}\nBody: {}",
                status,
                error_body
            );
        }

        tracing::debug!(to = %message.to, "Email handed to relay");
        Ok(())
    }

    fn name(&self) -> &str {
        "http-relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "counselor@campus.edu".to_string(),
            subject: "Alert".to_string(),
            text: "text".to_string(),
            html: "<p>html</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_relay_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "from": "alerts@mindcare.test",
                "to": "counselor@campus.edu",
                "subject": "Alert"
            })))
            .with_status(202)
            .create_async()
            .await;

        let relay = HttpMailRelay::new(format!("{}/send", server.url()), "alerts@mindcare.test")
            .unwrap()
            .with_token("secret");
        relay.send(&message()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_relay_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send")
            .with_status(500)
            .with_body("smtp down")
            .create_async()
            .await;

        let relay =
            HttpMailRelay::new(format!("{}/send", server.url()), "alerts@mindcare.test").unwrap();
        let err = relay.send(&message()).await.unwrap_err();
        assert!(err.to_string().contains("smtp down"));
    }
}
