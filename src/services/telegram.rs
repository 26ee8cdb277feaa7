//! Outbound notification channel
//!
//! The `Notifier` trait is the seam between the reminder scheduler and the
//! outside world; the production implementation talks to the Telegram Bot
//! API. Deliveries are best-effort: callers log failures and move on, they
//! never retry.

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Outbound push channel for user notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` to the channel identified by `target`.
    ///
    /// Best-effort: an `Ok` return means the message was handed to the
    /// channel, not that anyone read it.
    async fn send(&self, target: &str, text: &str) -> Result<()>;
}

/// Telegram Bot API notifier
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
}

impl TelegramNotifier {
    /// Create a notifier for the given bot token.
    ///
    /// `api_base` is normally `https://api.telegram.org`; it is
    /// configurable for self-hosted Bot API servers.
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token: bot_token.into(),
            api_base: api_base.into(),
        }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        let response = self
            .http
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await
            .context("Failed to reach the Telegram Bot API")?;

        if !response.status().is_success() {
            anyhow::bail!("Telegram sendMessage returned {}", response.status());
        }

        Ok(())
    }
}

/// Stand-in notifier used when no bot token is configured.
///
/// Accepts and drops every message so the rest of the system behaves
/// normally; the dropped text is visible at debug level.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        tracing::debug!(chat_id, "notifications disabled, dropping message: {}", text);
        Ok(())
    }
}
