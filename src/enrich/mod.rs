//! Signal enrichment abstraction.
//!
//! Enrichment lookups answer "how significant is this account" with a
//! single number. Any transport or parse failure yields `None`, which
//! callers must treat as "retry later", never as a failed filter.

pub mod followers;

use async_trait::async_trait;

// Re-export for convenience
pub use followers::FollowerStatsClient;

/// The kinds of metrics a signal source can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Follower count of the account
    Followers,
    /// Provider trust/reputation score
    TrustScore,
}

/// Trait for keyed metric lookups.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Look up a metric for the subject. `None` means "unknown right
    /// now"; the caller decides whether to retry on a later cycle.
    async fn metric(&self, subject: &str, kind: MetricKind) -> Option<u64>;

    /// Lookups attempted over the process lifetime, successful or not.
    /// Used for externally-observed rate accounting.
    fn request_count(&self) -> u64;
}
