//! Pending-notification retry queue.
//!
//! Failed deliveries wait here for the next drain. Entries past the
//! maximum age are dropped unretried and stay unmarked in the dedup
//! store, so the upstream resurfacing the item can trigger a fresh
//! attempt.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::config::RetryConfig;

/// A delivery that failed and awaits a bounded-lifetime retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub message: String,
    pub item_id: String,
    pub enqueued_at: DateTime<Utc>,
}

/// FIFO queue of pending notifications.
#[derive(Debug)]
pub struct RetryQueue {
    entries: VecDeque<Pending>,
    max_age: Duration,
    drain_batch: usize,
}

impl RetryQueue {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            max_age: Duration::seconds(config.max_age_secs as i64),
            drain_batch: config.drain_batch.max(1),
        }
    }

    /// Enqueue a freshly failed delivery.
    pub fn push(&mut self, message: String, item_id: String, now: DateTime<Utc>) {
        self.entries.push_back(Pending {
            message,
            item_id,
            enqueued_at: now,
        });
    }

    /// Re-enqueue a failed retry with a refreshed timestamp.
    pub fn requeue(&mut self, mut pending: Pending, now: DateTime<Utc>) {
        pending.enqueued_at = now;
        self.entries.push_back(pending);
    }

    /// Pop up to one drain batch, oldest first.
    pub fn take_batch(&mut self) -> Vec<Pending> {
        let count = self.drain_batch.min(self.entries.len());
        self.entries.drain(..count).collect()
    }

    /// Whether the entry has exceeded its maximum age at `now`.
    pub fn is_expired(&self, pending: &Pending, now: DateTime<Utc>) -> bool {
        now - pending.enqueued_at > self.max_age
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
