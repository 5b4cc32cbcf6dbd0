//! Best-effort Telegram notification sink.
//!
//! Delivery never affects the run's own success: failures are logged and
//! reported as `false`, nothing more.

use std::time::Duration;

use crate::config::TelegramConfig;

/// Telegram bot API client for one chat.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier from the config; an unconfigured sink is fine and
    /// turns every [`TelegramNotifier::send`] into a logged no-op.
    pub fn new(config: TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Send an HTML-formatted message. Returns whether delivery succeeded.
    pub async fn send(&self, text: &str) -> bool {
        if !self.config.is_configured() {
            tracing::warn!("telegram sink not configured, skipping notification");
            return false;
        }

        tracing::info!("sending telegram notification");
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        );
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("telegram notification delivered");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(%status, body = %body, "telegram notification rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "telegram notification failed");
                false
            }
        }
    }
}
