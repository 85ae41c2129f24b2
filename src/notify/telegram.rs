//! Telegram delivery sink.
//!
//! Sends one `sendMessage` call per delivery, building a fresh client
//! each time. A long-lived connection goes stale across the idle gaps
//! between alerts, so per-call sessions trade a little setup cost for
//! not inheriting a dead socket. The request carries a hard timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::NotifierConfig;
use crate::error::{AppError, Result};
use crate::notify::NotifySink;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram `sendMessage` sink with a fixed destination chat.
pub struct TelegramSink {
    api_base: String,
    bot_token: String,
    chat_id: String,
    timeout: Duration,
}

impl TelegramSink {
    /// Create a sink; fails only if the bot token cannot be resolved.
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        Ok(Self {
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token: config.resolve_bot_token()?,
            chat_id: config.chat_id.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Override the API base URL, for tests.
    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[async_trait]
impl NotifySink for TelegramSink {
    async fn deliver(&self, text: &str) -> Result<()> {
        // Fresh session per call; see module docs.
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let response: SendMessageResponse = client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            return Err(AppError::delivery(
                response
                    .description
                    .unwrap_or_else(|| "sendMessage reported not ok".to_string()),
            ));
        }
        Ok(())
    }
}
