//! Poll cycle orchestration.
//!
//! One cycle walks IDLE → FETCHING → FILTERING → NOTIFYING →
//! PERSISTING. Before fetching, the pending-retry queue is drained
//! (subject to the backoff cooldown). The orchestrator owns the
//! watermark cursor, the dedup store, the retry queue, and the
//! notifier's backoff; it is not reentrant, so the scheduler runs at
//! most one cycle at a time.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;

use crate::enrich::SignalSource;
use crate::models::{Item, format_alert};
use crate::notify::Notifier;
use crate::pipeline::filter::{FilterPolicy, Verdict};
use crate::pipeline::retry::RetryQueue;
use crate::source::ItemSource;
use crate::store::{DedupStore, SnapshotStore};

/// Counters from one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub candidates: usize,
    pub notified: usize,
    pub rejected: usize,
    pub deferred: usize,
    pub retries_delivered: usize,
    pub retries_dropped: usize,
    pub delivery_failures: usize,
}

/// Single-owner pipeline state and the cycle state machine.
pub struct Orchestrator {
    source: Box<dyn ItemSource>,
    signals: Box<dyn SignalSource>,
    notifier: Notifier,
    filter: FilterPolicy,
    dedup: DedupStore,
    snapshots: Box<dyn SnapshotStore>,
    retries: RetryQueue,
    recency_cutoff: Duration,
    /// Id of the newest item observed by the previous successful
    /// cycle. Mutated only at the end of a cycle; never regresses.
    watermark: Option<String>,
    last_failure_at: Option<DateTime<Utc>>,
    shutdown: watch::Receiver<bool>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn ItemSource>,
        signals: Box<dyn SignalSource>,
        notifier: Notifier,
        filter: FilterPolicy,
        dedup: DedupStore,
        snapshots: Box<dyn SnapshotStore>,
        retries: RetryQueue,
        recency_cutoff: StdDuration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            signals,
            notifier,
            filter,
            dedup,
            snapshots,
            retries,
            recency_cutoff: Duration::from_std(recency_cutoff)
                .unwrap_or_else(|_| Duration::seconds(30)),
            watermark: None,
            last_failure_at: None,
            shutdown,
        }
    }

    /// Run one full poll cycle. Upstream failures end the cycle early
    /// with the watermark untouched; they never propagate.
    pub async fn run_cycle(&mut self) -> CycleStats {
        let mut stats = CycleStats::default();

        self.drain_retries(&mut stats).await;
        if self.shutdown_requested() {
            return stats;
        }

        let (candidates, newest_seen) = match self.fetch_candidates(&mut stats).await {
            Ok(scan) => scan,
            Err(e) => {
                log::warn!("Fetch failed, retrying next cycle: {e}");
                return stats;
            }
        };
        stats.candidates = candidates.len();

        for item in candidates {
            if self.shutdown_requested() {
                return stats;
            }
            self.handle_candidate(item, &mut stats).await;
        }

        // PERSISTING: advance the watermark only when the cycle saw at
        // least one item. Items come newest-first, so the first id of
        // the first page can only move the cursor forward.
        if let Some(newest) = newest_seen {
            self.watermark = Some(newest);
        }

        stats
    }

    /// Persist the dedup store, for shutdown.
    pub async fn persist(&self) {
        self.snapshots.save(&self.dedup).await;
    }

    /// Current watermark cursor.
    pub fn watermark(&self) -> Option<&str> {
        self.watermark.as_deref()
    }

    /// Pending notifications awaiting retry.
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    async fn handle_candidate(&mut self, item: Item, stats: &mut CycleStats) {
        let verdict = self.filter.evaluate(&item, self.signals.as_ref()).await;
        match verdict {
            Verdict::Defer => {
                log::debug!("Signal unknown for {}, reconsidering next cycle", item.id);
                stats.deferred += 1;
            }
            Verdict::Reject(reason) => {
                log::debug!("Item {} rejected: {reason}", item.id);
                self.mark_processed(&item.id).await;
                stats.rejected += 1;
            }
            Verdict::Pass { primary } => {
                log::info!(
                    "Item {} ({}) qualified with metric {primary}",
                    item.id,
                    item.payload.name
                );
                let message = format_alert(&item, primary);
                if self.notifier.send(&message).await {
                    self.mark_processed(&item.id).await;
                    stats.notified += 1;
                } else {
                    let now = Utc::now();
                    self.retries.push(message, item.id.clone(), now);
                    self.last_failure_at = Some(now);
                    stats.delivery_failures += 1;
                    self.pause(self.notifier.backoff_delay()).await;
                }
            }
        }
    }

    /// Drain up to one batch of pending notifications, oldest first.
    async fn drain_retries(&mut self, stats: &mut CycleStats) {
        if self.retries.is_empty() || !self.cooldown_elapsed(Utc::now()) {
            return;
        }

        for pending in self.retries.take_batch() {
            let now = Utc::now();
            if self.retries.is_expired(&pending, now) {
                // Dropped without marking processed: if the upstream
                // resurfaces the item it may be retried from scratch.
                log::info!(
                    "Dropping pending notification for {} past max age",
                    pending.item_id
                );
                stats.retries_dropped += 1;
                continue;
            }

            if self.notifier.send(&pending.message).await {
                self.mark_processed(&pending.item_id).await;
                stats.retries_delivered += 1;
            } else {
                self.last_failure_at = Some(Utc::now());
                stats.delivery_failures += 1;
                self.retries.requeue(pending, Utc::now());
                self.pause(self.notifier.backoff_delay()).await;
            }

            if self.shutdown_requested() {
                return;
            }
        }
    }

    /// FETCHING: paginate from the top until the previous watermark,
    /// the recency cutoff, or page exhaustion, collecting items the
    /// dedup store has not seen.
    async fn fetch_candidates(
        &mut self,
        stats: &mut CycleStats,
    ) -> crate::error::Result<(Vec<Item>, Option<String>)> {
        let cutoff = Utc::now() - self.recency_cutoff;
        let mut cursor: Option<String> = None;
        let mut newest_seen: Option<String> = None;
        let mut candidates = Vec::new();

        loop {
            let page = self.source.fetch_page(cursor.as_deref()).await?;
            if newest_seen.is_none() {
                newest_seen = page.items.first().map(|item| item.id.clone());
            }
            stats.fetched += page.items.len();

            for item in page.items {
                if self.watermark.as_deref() == Some(item.id.as_str()) {
                    log::debug!("Reached watermark {}, stopping scan", item.id);
                    return Ok((candidates, newest_seen));
                }
                // Newest-first ordering: everything after a stale item
                // is staler still.
                if item.created_at < cutoff {
                    log::debug!("Item {} past recency cutoff, stopping scan", item.id);
                    return Ok((candidates, newest_seen));
                }
                if !self.dedup.contains(&item.id) {
                    candidates.push(item);
                }
            }

            if !page.has_next {
                break;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok((candidates, newest_seen))
    }

    /// Record an id as handled and persist the snapshot immediately.
    async fn mark_processed(&mut self, id: &str) {
        self.dedup.mark(id);
        self.snapshots.save(&self.dedup).await;
    }

    fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_failure_at {
            Some(failed_at) => {
                let cooldown = Duration::from_std(self.notifier.backoff_delay())
                    .unwrap_or_else(|_| Duration::seconds(0));
                now - failed_at >= cooldown
            }
            None => true,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep for the given delay, waking early on shutdown.
    async fn pause(&mut self, delay: StdDuration) {
        if self.shutdown_requested() {
            return;
        }
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::{FilterConfig, RetryConfig};
    use crate::enrich::MetricKind;
    use crate::error::{AppError, Result};
    use crate::models::Payload;
    use crate::notify::{Backoff, NotifySink};
    use crate::source::{ItemSource, Page};
    use crate::store::LocalSnapshotStore;

    /// Source that replays scripted pages; the last script entry
    /// repeats for subsequent cycles.
    struct FakeSource {
        scans: Vec<Vec<Page>>,
        calls: AtomicUsize,
        scan_offset: AtomicUsize,
    }

    impl FakeSource {
        fn new(scans: Vec<Vec<Page>>) -> Self {
            Self {
                scans,
                calls: AtomicUsize::new(0),
                scan_offset: AtomicUsize::new(0),
            }
        }

        fn single_page(items: Vec<Item>) -> Self {
            Self::new(vec![vec![Page {
                items,
                has_next: false,
                next_cursor: None,
            }]])
        }
    }

    #[async_trait]
    impl ItemSource for FakeSource {
        async fn fetch_page(&self, after_cursor: Option<&str>) -> Result<Page> {
            if after_cursor.is_none() {
                // New scan starts from the top.
                self.scan_offset.fetch_add(1, Ordering::Relaxed);
                self.calls.store(0, Ordering::Relaxed);
            }
            let scan_index = (self.scan_offset.load(Ordering::Relaxed).max(1) - 1)
                .min(self.scans.len() - 1);
            let pages = &self.scans[scan_index];
            let page_index = self.calls.fetch_add(1, Ordering::Relaxed).min(pages.len() - 1);
            Ok(pages[page_index].clone())
        }
    }

    /// Source that always fails, for transient-failure behavior.
    struct FailingSource;

    #[async_trait]
    impl ItemSource for FailingSource {
        async fn fetch_page(&self, _after_cursor: Option<&str>) -> Result<Page> {
            Err(AppError::source("fetch", "connection reset"))
        }
    }

    struct TableSignals {
        table: HashMap<String, u64>,
        requests: AtomicU64,
    }

    impl TableSignals {
        fn new(entries: &[(&str, u64)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(s, v)| (s.to_string(), *v))
                    .collect(),
                requests: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl SignalSource for TableSignals {
        async fn metric(&self, subject: &str, _kind: MetricKind) -> Option<u64> {
            self.requests.fetch_add(1, Ordering::Relaxed);
            self.table.get(subject).copied()
        }

        fn request_count(&self) -> u64 {
            self.requests.load(Ordering::Relaxed)
        }
    }

    struct ScriptedSink {
        outcomes: Mutex<Vec<bool>>,
        delivered: Mutex<Vec<String>>,
    }

    impl ScriptedSink {
        fn always_ok() -> std::sync::Arc<SinkHandle> {
            Self::scripted(vec![])
        }

        fn scripted(outcomes: Vec<bool>) -> std::sync::Arc<SinkHandle> {
            std::sync::Arc::new(SinkHandle(ScriptedSink {
                outcomes: Mutex::new(outcomes),
                delivered: Mutex::new(Vec::new()),
            }))
        }
    }

    /// Shared handle so tests can inspect deliveries after the
    /// orchestrator takes ownership of the sink.
    struct SinkHandle(ScriptedSink);

    impl SinkHandle {
        fn delivered(&self) -> Vec<String> {
            self.0.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotifySink for std::sync::Arc<SinkHandle> {
        async fn deliver(&self, text: &str) -> Result<()> {
            let ok = {
                let mut outcomes = self.0.outcomes.lock().unwrap();
                if outcomes.is_empty() {
                    true
                } else {
                    outcomes.remove(0)
                }
            };
            if ok {
                self.0.delivered.lock().unwrap().push(text.to_string());
                Ok(())
            } else {
                Err(AppError::delivery("scripted failure"))
            }
        }
    }

    fn item(id: &str, age_secs: i64, subject: Option<&str>) -> Item {
        Item {
            id: id.to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
            subject: subject.map(String::from),
            payload: Payload {
                name: format!("Token {id}"),
                symbol: "TOK".to_string(),
                address: format!("Addr{id}"),
                description: String::new(),
            },
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        sink: std::sync::Arc<SinkHandle>,
        _tmp: TempDir,
        // Keeps the shutdown channel open for the orchestrator.
        _tx: watch::Sender<bool>,
    }

    fn fixture(
        source: Box<dyn ItemSource>,
        signals: TableSignals,
        sink: std::sync::Arc<SinkHandle>,
    ) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let snapshots = LocalSnapshotStore::new(tmp.path().join("notified.json"));
        let (tx, rx) = watch::channel(false);

        let orchestrator = Orchestrator::new(
            source,
            Box::new(signals),
            Notifier::new(
                Box::new(sink.clone()),
                Backoff::new(StdDuration::from_millis(1), StdDuration::from_millis(8)),
            ),
            FilterPolicy::new(&FilterConfig {
                primary_threshold: 20_000,
                secondary_threshold: None,
            }),
            DedupStore::new(100),
            Box::new(snapshots),
            RetryQueue::new(&RetryConfig {
                max_age_secs: 3600,
                drain_batch: 5,
            }),
            StdDuration::from_secs(30),
            rx,
        );

        Fixture {
            orchestrator,
            sink,
            _tmp: tmp,
            _tx: tx,
        }
    }

    #[tokio::test]
    async fn test_recency_cutoff_stops_scan_and_sets_watermark() {
        // A(id=3, now), B(id=2, now-10s), C(id=1, now-40s); cutoff 30s.
        let source = FakeSource::single_page(vec![
            item("3", 0, Some("alice")),
            item("2", 10, Some("alice")),
            item("1", 40, Some("alice")),
        ]);
        let signals = TableSignals::new(&[("alice", 150_000)]);
        let mut fx = fixture(Box::new(source), signals, ScriptedSink::always_ok());

        let stats = fx.orchestrator.run_cycle().await;

        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.notified, 2);
        assert_eq!(fx.orchestrator.watermark(), Some("3"));
        let delivered = fx.sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].contains("Token 3"));
        assert!(delivered[1].contains("Token 2"));
    }

    #[tokio::test]
    async fn test_cycle_is_idempotent() {
        let source = FakeSource::single_page(vec![item("3", 0, Some("alice"))]);
        let signals = TableSignals::new(&[("alice", 150_000)]);
        let mut fx = fixture(Box::new(source), signals, ScriptedSink::always_ok());

        let first = fx.orchestrator.run_cycle().await;
        assert_eq!(first.notified, 1);

        // Same upstream data: the watermark stops the scan, nothing
        // new is sent.
        let second = fx.orchestrator.run_cycle().await;
        assert_eq!(second.notified, 0);
        assert_eq!(fx.sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_qualifying_item_sends_exactly_once() {
        let source = FakeSource::single_page(vec![item("7", 0, Some("alice"))]);
        let signals = TableSignals::new(&[("alice", 150_000)]);
        let mut fx = fixture(Box::new(source), signals, ScriptedSink::always_ok());

        fx.orchestrator.run_cycle().await;

        let delivered = fx.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("150,000 followers"));
    }

    #[tokio::test]
    async fn test_filter_asymmetry_reject_marks_defer_does_not() {
        // "lowbie" definitively fails; "ghost" has no metric at all.
        let source = FakeSource::single_page(vec![
            item("10", 0, Some("lowbie")),
            item("9", 1, Some("ghost")),
        ]);
        let signals = TableSignals::new(&[("lowbie", 120)]);
        let mut fx = fixture(Box::new(source), signals, ScriptedSink::always_ok());

        let stats = fx.orchestrator.run_cycle().await;
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.deferred, 1);
        assert!(fx.orchestrator.dedup.contains("10"));
        assert!(!fx.orchestrator.dedup.contains("9"));
        assert!(fx.sink.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_queues_retry_then_delivers() {
        let source = FakeSource::single_page(vec![item("5", 0, Some("alice"))]);
        let signals = TableSignals::new(&[("alice", 99_999)]);
        let sink = ScriptedSink::scripted(vec![false]);
        let mut fx = fixture(Box::new(source), signals, sink);

        let first = fx.orchestrator.run_cycle().await;
        assert_eq!(first.delivery_failures, 1);
        assert_eq!(fx.orchestrator.pending_retries(), 1);
        // Not marked processed until a delivery succeeds.
        assert!(!fx.orchestrator.dedup.contains("5"));

        // Cooldown is milliseconds in this fixture; the next cycle
        // drains the queue before fetching.
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let second = fx.orchestrator.run_cycle().await;
        assert_eq!(second.retries_delivered, 1);
        assert_eq!(fx.orchestrator.pending_retries(), 0);
        assert!(fx.orchestrator.dedup.contains("5"));
        assert_eq!(fx.sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_pending_is_dropped_without_send() {
        let source = FakeSource::single_page(vec![]);
        let signals = TableSignals::new(&[]);
        let mut fx = fixture(Box::new(source), signals, ScriptedSink::always_ok());

        fx.orchestrator.retries.push(
            "stale alert".to_string(),
            "old-1".to_string(),
            Utc::now() - Duration::seconds(7200),
        );

        let stats = fx.orchestrator.run_cycle().await;
        assert_eq!(stats.retries_dropped, 1);
        assert!(fx.sink.delivered().is_empty());
        // Deliberately unmarked: a resurfaced item may retry fresh.
        assert!(!fx.orchestrator.dedup.contains("old-1"));
    }

    #[tokio::test]
    async fn test_empty_cycle_leaves_watermark_untouched() {
        let source = FakeSource::new(vec![
            vec![Page {
                items: vec![item("3", 0, Some("alice"))],
                has_next: false,
                next_cursor: None,
            }],
            vec![Page::default()],
        ]);
        let signals = TableSignals::new(&[("alice", 150_000)]);
        let mut fx = fixture(Box::new(source), signals, ScriptedSink::always_ok());

        fx.orchestrator.run_cycle().await;
        assert_eq!(fx.orchestrator.watermark(), Some("3"));

        fx.orchestrator.run_cycle().await;
        assert_eq!(fx.orchestrator.watermark(), Some("3"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_fatal_and_keeps_watermark() {
        let signals = TableSignals::new(&[]);
        let mut fx = fixture(Box::new(FailingSource), signals, ScriptedSink::always_ok());

        let stats = fx.orchestrator.run_cycle().await;
        assert_eq!(stats.fetched, 0);
        assert_eq!(fx.orchestrator.watermark(), None);
    }

    #[tokio::test]
    async fn test_pagination_follows_cursor_until_cutoff() {
        let page_one = Page {
            items: vec![item("30", 0, Some("alice")), item("29", 5, Some("alice"))],
            has_next: true,
            next_cursor: Some("c1".to_string()),
        };
        let page_two = Page {
            items: vec![item("28", 10, Some("alice")), item("27", 50, Some("alice"))],
            has_next: true,
            next_cursor: Some("c2".to_string()),
        };
        let source = FakeSource::new(vec![vec![page_one, page_two]]);
        let signals = TableSignals::new(&[("alice", 40_000)]);
        let mut fx = fixture(Box::new(source), signals, ScriptedSink::always_ok());

        let stats = fx.orchestrator.run_cycle().await;
        // "27" is past the cutoff; the scan stops there.
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.notified, 3);
        assert_eq!(fx.orchestrator.watermark(), Some("30"));
    }
}
