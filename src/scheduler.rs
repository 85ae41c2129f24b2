// src/scheduler.rs

//! Fixed-interval scheduling of poll cycles.
//!
//! Exactly one cycle runs at a time: the cycle is awaited inline, so a
//! tick that fires while a cycle is still running is skipped, never
//! queued. A shutdown signal stops scheduling, lets the in-flight
//! delivery finish (bounded by the notifier's timeout), persists the
//! dedup snapshot, and returns.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::error::Result;
use crate::pipeline::Orchestrator;

/// Run poll cycles at a fixed interval until shutdown.
pub async fn run(
    mut orchestrator: Orchestrator,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    // The first tick fires after one full interval, a startup grace
    // that avoids alerting on items created before the process came up.
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!("Polling every {interval:?}");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if *shutdown.borrow() {
                    break;
                }
                let stats = orchestrator.run_cycle().await;
                log::debug!("Cycle complete: {stats:?}");
                if orchestrator.pending_retries() > 0 {
                    log::info!(
                        "{} notification(s) pending retry",
                        orchestrator.pending_retries()
                    );
                }
            }
            _ = shutdown.changed() => {
                break;
            }
        }
    }

    log::info!("Shutting down, persisting dedup snapshot");
    orchestrator.persist().await;
    Ok(())
}
