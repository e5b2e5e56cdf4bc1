//! Webhook notification dispatch.
//!
//! One JSON POST per notification, no retry — the sweep cadence is the retry
//! policy. A completed exchange with a non-2xx status counts as a failure;
//! the consumer acking with an error body is the only thing we can observe.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::errors::CheckError;
use crate::core::types::NotificationPayload;

/// Outbound notification seam. The sweep and the tests only see this trait.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), CheckError>;
}

/// POSTs payloads to the fixed webhook URL.
pub struct NotificationDispatcher {
    http: reqwest::Client,
    webhook_url: String,
}

impl NotificationDispatcher {
    pub fn new(http: reqwest::Client, webhook_url: String) -> Self {
        Self { http, webhook_url }
    }
}

#[async_trait]
impl NotificationSink for NotificationDispatcher {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), CheckError> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| CheckError::Transport(format!("webhook post: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CheckError::Transport(format!(
                "webhook answered {}: {}",
                status, body
            )));
        }

        debug!("webhook response: {}", body);
        info!("notification sent for {}", payload.user_name);
        Ok(())
    }
}
