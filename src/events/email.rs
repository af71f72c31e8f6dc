//! Email delivery for escalation notices

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{RigwatchError, Result};

/// Delivers an email-class notification for a client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, client: &str, subject: &str, body: &str) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    client: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts emails as JSON to a mail relay webhook
#[derive(Clone)]
pub struct WebhookEmailService {
    client: Client,
    webhook_url: String,
}

impl WebhookEmailService {
    /// Create from the `RIGWATCH_EMAIL_WEBHOOK` environment variable
    pub fn from_env() -> Option<Arc<Self>> {
        std::env::var("RIGWATCH_EMAIL_WEBHOOK").ok().map(|url| {
            info!("Email notifications enabled");
            Self::new(url)
        })
    }

    pub fn new(webhook_url: String) -> Arc<Self> {
        Arc::new(Self {
            client: Client::new(),
            webhook_url,
        })
    }
}

#[async_trait]
impl EmailService for WebhookEmailService {
    async fn send(&self, client: &str, subject: &str, body: &str) -> Result<()> {
        let payload = WebhookPayload {
            client,
            subject,
            body,
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("Email for {} sent: {}", client, subject);
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("Email webhook failed: {} - {}", status, text);
            Err(RigwatchError::Delivery(format!("HTTP {}: {}", status, text)))
        }
    }
}
