//! Significance filter policy.
//!
//! A short-circuiting chain of predicates: subject present, primary
//! metric over threshold, then (optionally) secondary metric over its
//! threshold. The verdict is deliberately three-valued:
//!
//! - `Reject` is a definite no. The underlying signals only grow or
//!   stay flat, so a rejected item can never qualify later and is
//!   marked processed without a notification.
//! - `Defer` means a lookup came back unknown. The item is left
//!   unmarked so the next cycle reconsiders it.

use crate::config::FilterConfig;
use crate::enrich::{MetricKind, SignalSource};
use crate::models::Item;

/// Outcome of evaluating one item against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// All predicates passed; carries the primary metric for rendering.
    Pass { primary: u64 },
    /// A predicate definitely failed; mark processed, never notify.
    Reject(&'static str),
    /// A signal was unavailable; skip this cycle, reconsider next.
    Defer,
}

/// Threshold-based filter policy.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    primary_threshold: u64,
    secondary_threshold: Option<u64>,
}

impl FilterPolicy {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            primary_threshold: config.primary_threshold,
            secondary_threshold: config.secondary_threshold,
        }
    }

    /// Evaluate the predicate chain for one item.
    pub async fn evaluate(&self, item: &Item, signals: &dyn SignalSource) -> Verdict {
        let Some(subject) = item.effective_subject() else {
            return Verdict::Reject("no subject");
        };

        let Some(primary) = signals.metric(&subject, MetricKind::Followers).await else {
            return Verdict::Defer;
        };
        if primary < self.primary_threshold {
            return Verdict::Reject("below primary threshold");
        }

        if let Some(threshold) = self.secondary_threshold {
            let Some(secondary) = signals.metric(&subject, MetricKind::TrustScore).await else {
                return Verdict::Defer;
            };
            if secondary < threshold {
                return Verdict::Reject("below secondary threshold");
            }
        }

        Verdict::Pass { primary }
    }
}
