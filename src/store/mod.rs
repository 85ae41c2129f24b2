//! Bounded dedup state and snapshot persistence.
//!
//! The dedup store is a capacity-bounded membership set with FIFO
//! eviction. Snapshots hold its contents oldest-first so a reload
//! preserves eviction order. Load and save failures are logged and
//! degrade to an empty store / skipped write; they are never fatal.

pub mod local;

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Re-export for convenience
pub use local::LocalSnapshotStore;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 2;

/// On-disk snapshot of handled ids, oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub ids: Vec<String>,
}

/// Bounded membership set of already-handled item ids.
///
/// Inserting at capacity evicts the oldest id. An evicted id may be
/// reprocessed if the upstream resurfaces it; that tradeoff is accepted.
#[derive(Debug, Clone)]
pub struct DedupStore {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl DedupStore {
    /// Create an empty store with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Rebuild a store from ids listed oldest-first, keeping the most
    /// recent `capacity` entries if there are more.
    pub fn from_ids(capacity: usize, ids: Vec<String>) -> Self {
        let mut store = Self::new(capacity);
        for id in ids {
            store.mark(&id);
        }
        store
    }

    /// Migrate a legacy unbounded snapshot (a bare id array with no
    /// recorded order). Recency is approximated by a stable sort, then
    /// the newest `capacity` ids are kept.
    pub fn from_legacy(capacity: usize, mut ids: Vec<String>) -> Self {
        ids.sort();
        ids.dedup();
        let skip = ids.len().saturating_sub(capacity);
        Self::from_ids(capacity, ids.split_off(skip))
    }

    /// Whether the id has already been handled.
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Record an id as handled. Idempotent; evicts the oldest id when
    /// at capacity.
    pub fn mark(&mut self, id: &str) {
        if self.members.contains(id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
                log::debug!("Dedup store at capacity, evicted oldest id {evicted}");
            }
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
    }

    /// Number of ids currently held.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids oldest-first, as persisted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Build the on-disk snapshot representation.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            ids: self.order.iter().cloned().collect(),
        }
    }
}

/// Trait for dedup snapshot backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the persisted store, or an empty one if nothing usable
    /// exists. Never fails: unreadable state is logged and discarded.
    async fn load(&self, capacity: usize) -> DedupStore;

    /// Persist the store, best effort. Write failures are logged; the
    /// in-memory store stays authoritative.
    async fn save(&self, store: &DedupStore);
}
