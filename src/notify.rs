//! Out-of-band delivery of verification codes.
//!
//! Delivery is fire-and-forget: the code is already stored when the sink is
//! called, and a failed delivery only means the user has to ask again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};
use url::Url;

use crate::db::Action;

/// Errors from a notification sink.
#[derive(Debug)]
pub enum NotifyError {
    Http(reqwest::Error),
    Status(u16),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http(e) => write!(f, "Delivery request failed: {}", e),
            NotifyError::Status(code) => write!(f, "Delivery endpoint returned {}", code),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Something that can deliver a verification code to an e-mail address.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_code(&self, email: &str, code: &str, action: Action) -> Result<(), NotifyError>;
}

/// Rendered verification e-mail.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub action: Action,
}

impl VerificationEmail {
    pub fn new(to: &str, code: &str, action: Action) -> Self {
        Self {
            to: to.to_string(),
            subject: "Email Verification".to_string(),
            html: format!(
                "<h1>Code for {}</h1>\n<p>Please ENTER your CODE:</p>\n<h1>{}</h1>",
                action, code
            ),
            action,
        }
    }
}

/// Logs deliveries instead of sending them. The code itself is only logged
/// when `reveal_codes` is set.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    pub reveal_codes: bool,
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_code(&self, email: &str, code: &str, action: Action) -> Result<(), NotifyError> {
        if self.reveal_codes {
            info!(email = %email, action = %action, code = %code, "Verification code issued");
        } else {
            info!(email = %email, action = %action, "Verification code issued");
        }
        Ok(())
    }
}

/// Upper bound on a single webhook delivery, connect included.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs the rendered e-mail as JSON to a mail relay.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(url: Url) -> Result<Self, NotifyError> {
        Self::with_timeout(url, DELIVERY_TIMEOUT)
    }

    /// Build a sink whose requests give up after `timeout`.
    pub fn with_timeout(url: Url, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::Http)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send_code(&self, email: &str, code: &str, action: Action) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&VerificationEmail::new(email, code, action))
            .send()
            .await
            .map_err(NotifyError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Hand a code to the sink on a background task.
pub fn dispatch(sink: Arc<dyn NotificationSink>, email: String, code: String, action: Action) {
    tokio::spawn(async move {
        if let Err(e) = sink.send_code(&email, &code, action).await {
            error!(email = %email, action = %action, error = %e, "Failed to deliver verification code");
        }
    });
}
