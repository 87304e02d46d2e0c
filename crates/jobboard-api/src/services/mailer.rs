//! Outgoing email.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

/// A plain-text message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> ApiResult<()>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers through an HTTP mail API (JSON POST, bearer key).
pub struct HttpMailer {
    url: String,
    api_key: Option<String>,
    from: String,
    client: Client,
}

impl HttpMailer {
    pub fn new(url: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to create mail client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            api_key,
            from: from.into(),
            client,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> ApiResult<()> {
        let body = SendRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.text,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Mail request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, to = %email.to, "Mail API rejected message");
            return Err(ApiError::internal(format!("Mail API error {}: {}", status, text)));
        }

        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Logs messages instead of sending them and keeps a copy.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<Email>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far.
    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> ApiResult<()> {
        info!(to = %email.to, subject = %email.subject, "Email (not delivered)");
        self.sent.lock().await.push(email);
        Ok(())
    }
}
