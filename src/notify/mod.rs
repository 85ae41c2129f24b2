//! Notification delivery with exponential backoff.
//!
//! The sink performs one delivery with a hard timeout; the `Notifier`
//! wraps it with the process-wide backoff scalar: doubled (capped) on
//! any failure, reset to the floor on any success. Whether a failed
//! message is queued for retry is the caller's decision, not the
//! notifier's.

pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use telegram::TelegramSink;

/// Trait for delivery transports.
#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Deliver one formatted message to the fixed destination.
    async fn deliver(&self, text: &str) -> Result<()>;
}

/// Process-wide delivery backoff scalar.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    floor: Duration,
    ceiling: Duration,
}

impl Backoff {
    /// Create a backoff starting at the floor.
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            current: floor,
            floor,
            ceiling,
        }
    }

    /// Current delay to wait after a failure.
    pub fn delay(&self) -> Duration {
        self.current
    }

    /// Double the delay, capped at the ceiling.
    pub fn record_failure(&mut self) {
        self.current = (self.current * 2).min(self.ceiling);
    }

    /// Reset the delay to the floor.
    pub fn record_success(&mut self) {
        self.current = self.floor;
    }
}

/// Delivery front-end owning the backoff state.
pub struct Notifier {
    sink: Box<dyn NotifySink>,
    backoff: Backoff,
}

impl Notifier {
    /// Wrap a sink with backoff accounting.
    pub fn new(sink: Box<dyn NotifySink>, backoff: Backoff) -> Self {
        Self { sink, backoff }
    }

    /// Attempt one delivery. Success resets the backoff and returns
    /// true; any failure doubles it and returns false.
    pub async fn send(&mut self, text: &str) -> bool {
        match self.sink.deliver(text).await {
            Ok(()) => {
                self.backoff.record_success();
                true
            }
            Err(e) => {
                self.backoff.record_failure();
                log::warn!(
                    "Delivery failed (next backoff {:?}): {}",
                    self.backoff.delay(),
                    e
                );
                false
            }
        }
    }

    /// Current backoff delay.
    pub fn backoff_delay(&self) -> Duration {
        self.backoff.delay()
    }
}
