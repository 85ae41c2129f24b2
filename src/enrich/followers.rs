//! Follower-stats API client.
//!
//! Keyed REST lookups against a TweetScout-style API. No caching:
//! repeated lookups for the same handle hit the network each time.
//! There is no in-process rate limiting; the request counter exists so
//! usage against the provider's quota can be observed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{EnrichmentConfig, HttpConfig};
use crate::enrich::{MetricKind, SignalSource};
use crate::error::Result;

/// REST client for follower and trust-score lookups.
pub struct FollowerStatsClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
    requests: AtomicU64,
}

impl FollowerStatsClient {
    /// Create a client; fails only if the API key cannot be resolved.
    pub fn new(enrichment: &EnrichmentConfig, http: &HttpConfig) -> Result<Self> {
        let api_key = enrichment.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .user_agent(&http.user_agent)
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: enrichment.endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
            requests: AtomicU64::new(0),
        })
    }

    fn route(kind: MetricKind) -> (&'static str, &'static str) {
        match kind {
            MetricKind::Followers => ("followers-stats", "followers_count"),
            MetricKind::TrustScore => ("score", "score"),
        }
    }

    async fn lookup(&self, subject: &str, kind: MetricKind) -> Result<Option<u64>> {
        let (path, field) = Self::route(kind);
        let url = format!("{}/{}", self.endpoint, path);

        let body: Value = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("ApiKey", &self.api_key)
            .query(&[("user_handle", subject)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body.get(field).and_then(Value::as_u64))
    }
}

#[async_trait]
impl SignalSource for FollowerStatsClient {
    async fn metric(&self, subject: &str, kind: MetricKind) -> Option<u64> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        match self.lookup(subject, kind).await {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                log::warn!("Metric {kind:?} missing in response for {subject}");
                None
            }
            Err(e) => {
                log::warn!("Metric {kind:?} lookup failed for {subject}: {e}");
                None
            }
        }
    }

    fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_mapping() {
        assert_eq!(
            FollowerStatsClient::route(MetricKind::Followers),
            ("followers-stats", "followers_count")
        );
        assert_eq!(
            FollowerStatsClient::route(MetricKind::TrustScore),
            ("score", "score")
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let enrichment = EnrichmentConfig {
            endpoint: "https://api.example.com/v2/".to_string(),
            api_key: Some("k".to_string()),
        };
        let client = FollowerStatsClient::new(&enrichment, &HttpConfig::default()).unwrap();
        assert_eq!(client.endpoint, "https://api.example.com/v2");
        assert_eq!(client.request_count(), 0);
    }
}
