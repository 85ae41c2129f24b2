// src/config.rs

//! Application configuration structures.
//!
//! Loaded from a TOML file with per-field defaults, so a partial config
//! (or none at all) still yields a runnable setup. Credentials may be
//! supplied either in the file or through environment variables.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "MINTWATCH_BOT_TOKEN";

/// Environment variable holding the enrichment API key.
pub const ENRICHMENT_KEY_ENV: &str = "MINTWATCH_ENRICHMENT_KEY";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Upstream token feed settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Follower-stats lookup settings
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Telegram delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Filter thresholds
    #[serde(default)]
    pub filter: FilterConfig,

    /// Poll scheduling settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Dedup snapshot settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Failed-delivery retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.source.endpoint)
            .map_err(|e| AppError::validation(format!("source.endpoint: {e}")))?;
        url::Url::parse(&self.enrichment.endpoint)
            .map_err(|e| AppError::validation(format!("enrichment.endpoint: {e}")))?;
        if self.source.page_size == 0 {
            return Err(AppError::validation("source.page_size must be > 0"));
        }
        if self.notifier.chat_id.trim().is_empty() {
            return Err(AppError::validation("notifier.chat_id is empty"));
        }
        if self.notifier.timeout_secs == 0 {
            return Err(AppError::validation("notifier.timeout_secs must be > 0"));
        }
        if self.notifier.backoff_floor_secs == 0 {
            return Err(AppError::validation(
                "notifier.backoff_floor_secs must be > 0",
            ));
        }
        if self.notifier.backoff_ceiling_secs < self.notifier.backoff_floor_secs {
            return Err(AppError::validation(
                "notifier.backoff_ceiling_secs must be >= backoff_floor_secs",
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(AppError::validation("scheduler.interval_secs must be > 0"));
        }
        if self.store.capacity == 0 {
            return Err(AppError::validation("store.capacity must be > 0"));
        }
        if self.retry.drain_batch == 0 {
            return Err(AppError::validation("retry.drain_batch must be > 0"));
        }
        Ok(())
    }
}

/// Shared HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds for source and enrichment calls
    #[serde(default = "defaults::http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::http_timeout(),
        }
    }
}

/// Upstream token feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// GraphQL endpoint serving the token feed
    #[serde(default = "defaults::source_endpoint")]
    pub endpoint: String,

    /// Items requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Items older than this are considered already scanned
    #[serde(default = "defaults::recency_cutoff")]
    pub recency_cutoff_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::source_endpoint(),
            page_size: defaults::page_size(),
            recency_cutoff_secs: defaults::recency_cutoff(),
        }
    }
}

/// Follower-stats lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Base URL of the follower-stats API
    #[serde(default = "defaults::enrichment_endpoint")]
    pub endpoint: String,

    /// API key; falls back to the MINTWATCH_ENRICHMENT_KEY env var
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::enrichment_endpoint(),
            api_key: None,
        }
    }
}

impl EnrichmentConfig {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_credential(self.api_key.as_deref(), ENRICHMENT_KEY_ENV)
    }
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Bot token; falls back to the MINTWATCH_BOT_TOKEN env var
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Destination chat id
    #[serde(default = "defaults::chat_id")]
    pub chat_id: String,

    /// Hard timeout for a single delivery attempt
    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,

    /// Backoff floor after a delivery failure
    #[serde(default = "defaults::backoff_floor")]
    pub backoff_floor_secs: u64,

    /// Backoff ceiling
    #[serde(default = "defaults::backoff_ceiling")]
    pub backoff_ceiling_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: defaults::chat_id(),
            timeout_secs: defaults::notify_timeout(),
            backoff_floor_secs: defaults::backoff_floor(),
            backoff_ceiling_secs: defaults::backoff_ceiling(),
        }
    }
}

impl NotifierConfig {
    /// Resolve the bot token from config or environment.
    pub fn resolve_bot_token(&self) -> Result<String> {
        resolve_credential(self.bot_token.as_deref(), BOT_TOKEN_ENV)
    }
}

/// Filter thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum follower count for a creator to qualify
    #[serde(default = "defaults::primary_threshold")]
    pub primary_threshold: u64,

    /// Optional minimum trust score; disabled when absent
    #[serde(default)]
    pub secondary_threshold: Option<u64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            primary_threshold: defaults::primary_threshold(),
            secondary_threshold: None,
        }
    }
}

/// Poll scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between poll cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
        }
    }
}

/// Dedup snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the persisted dedup snapshot
    #[serde(default = "defaults::snapshot_path")]
    pub snapshot_path: String,

    /// Maximum number of handled ids retained
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: defaults::snapshot_path(),
            capacity: defaults::capacity(),
        }
    }
}

/// Failed-delivery retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Pending notifications older than this are dropped unretried
    #[serde(default = "defaults::retry_max_age")]
    pub max_age_secs: u64,

    /// Maximum pending entries drained per cycle
    #[serde(default = "defaults::drain_batch")]
    pub drain_batch: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_age_secs: defaults::retry_max_age(),
            drain_batch: defaults::drain_batch(),
        }
    }
}

fn resolve_credential(configured: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(value) = configured {
        if !value.trim().is_empty() {
            return Ok(value.to_string());
        }
    }
    match env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::config(format!(
            "missing credential: set it in the config file or via {env_var}"
        ))),
    }
}

/// Default values for configuration fields.
mod defaults {
    pub fn user_agent() -> String {
        "mintwatch/0.1 (+https://github.com/mintwatch)".to_string()
    }

    pub fn http_timeout() -> u64 {
        15
    }

    pub fn source_endpoint() -> String {
        "https://graphql-mainnet.boop.works/graphql".to_string()
    }

    pub fn page_size() -> usize {
        100
    }

    pub fn recency_cutoff() -> u64 {
        30
    }

    pub fn enrichment_endpoint() -> String {
        "https://api.tweetscout.io/v2".to_string()
    }

    pub fn chat_id() -> String {
        "-1002467782426".to_string()
    }

    pub fn notify_timeout() -> u64 {
        30
    }

    pub fn backoff_floor() -> u64 {
        2
    }

    pub fn backoff_ceiling() -> u64 {
        300
    }

    pub fn primary_threshold() -> u64 {
        20_000
    }

    pub fn interval() -> u64 {
        5
    }

    pub fn snapshot_path() -> String {
        "data/notified.json".to_string()
    }

    pub fn capacity() -> usize {
        10_000
    }

    pub fn retry_max_age() -> u64 {
        3600
    }

    pub fn drain_batch() -> usize {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.filter.primary_threshold, 20_000);
        assert_eq!(config.notifier.timeout_secs, 30);
        assert_eq!(config.retry.max_age_secs, 3600);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [filter]
            primary_threshold = 50000

            [scheduler]
            interval_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.primary_threshold, 50_000);
        assert_eq!(config.scheduler.interval_secs, 10);
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.store.capacity, 10_000);
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.source.endpoint = "not a url".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("source.endpoint"));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.notifier.backoff_floor_secs = 60;
        config.notifier.backoff_ceiling_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credential_from_config_value() {
        let enrichment = EnrichmentConfig {
            api_key: Some("key-from-file".to_string()),
            ..EnrichmentConfig::default()
        };
        assert_eq!(enrichment.resolve_api_key().unwrap(), "key-from-file");
    }
}
