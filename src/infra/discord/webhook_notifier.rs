// Discord delivery via an incoming webhook. No gateway, no bot user - one
// HTTP POST per notification.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::core::coaching::{Notifier, NotifyError};

pub struct DiscordWebhookNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("DISCORD_WEBHOOK_URL").ok())
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let url = self.webhook_url.as_ref().ok_or(NotifyError::NotConfigured)?;

        let response = self
            .client
            .post(url)
            .json(&json!({ "content": message }))
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Delivery(format!("{}: {}", status, body)));
        }

        tracing::info!("Notification sent to Discord");
        Ok(())
    }
}
