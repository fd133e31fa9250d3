//! Telegram notifications.
//!
//! Sends status messages through the Telegram Bot API. Delivery is
//! best-effort: failures are logged and dropped.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use signalflip_exec::Notifier;

/// Telegram Bot API base URL
const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Telegram delivery settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Chat to post into
    pub chat_id: String,
}

impl TelegramConfig {
    /// Create a new config.
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self { bot_token, chat_id }
    }

    /// Read `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`; `None` if either is unset or blank.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|v| !v.trim().is_empty())?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|v| !v.trim().is_empty())?;
        Some(Self::new(bot_token, chat_id))
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Notifier posting to a Telegram chat.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
    base_url: String,
}

impl TelegramNotifier {
    /// Create a new Telegram notifier.
    pub fn new(config: TelegramConfig) -> Self {
        Self::with_base_url(config, TELEGRAM_API_URL)
    }

    /// Create a notifier against another Bot API host.
    pub fn with_base_url(config: TelegramConfig, base_url: impl Into<String>) -> Self {
        Self {
            config,
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.config.bot_token)
    }

    async fn send(&self, text: &str) -> Result<(), String> {
        let payload = SendMessage {
            chat_id: &self.config.chat_id,
            text,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => debug!("Telegram message sent"),
            Err(e) => warn!(error = %e, "Telegram message failed"),
        }
    }
}

/// Notifier that only logs, used when Telegram is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        info!(target: "signalflip::notify", "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_url() {
        let notifier = TelegramNotifier::with_base_url(
            TelegramConfig::new("123:abc".to_string(), "42".to_string()),
            "http://localhost:9999/",
        );

        assert_eq!(notifier.send_message_url(), "http://localhost:9999/bot123:abc/sendMessage");
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(SendMessage {
            chat_id: "42",
            text: "hello",
        })
        .unwrap();

        assert_eq!(json, serde_json::json!({"chat_id": "42", "text": "hello"}));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_swallowed() {
        // Port 9 (discard) on localhost is closed on test machines; notify must not panic
        let notifier = TelegramNotifier::with_base_url(
            TelegramConfig::new("t".to_string(), "c".to_string()),
            "http://127.0.0.1:9",
        );

        notifier.notify("ping").await;
    }
}
