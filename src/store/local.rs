//! Local filesystem snapshot backend.
//!
//! Stores the dedup snapshot as a single JSON file, written atomically
//! (temp file then rename). Understands two formats on load:
//!
//! - current: `{ "version": 2, "ids": [...] }`, ids oldest-first
//! - legacy: a bare JSON array of ids from the old unbounded-set
//!   representation, migrated by keeping the most recent `capacity`
//!   ids under a stable sort

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::store::{DedupStore, Snapshot, SnapshotStore};

/// Local filesystem snapshot backend.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    path: PathBuf,
}

impl LocalSnapshotStore {
    /// Create a snapshot store writing to the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the snapshot file, returning None if it does not exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Parse snapshot bytes, falling back to the legacy array format.
    fn parse(bytes: &[u8], capacity: usize) -> Result<DedupStore> {
        if let Ok(snapshot) = serde_json::from_slice::<Snapshot>(bytes) {
            return Ok(DedupStore::from_ids(capacity, snapshot.ids));
        }

        let legacy: Vec<String> = serde_json::from_slice(bytes)?;
        log::info!(
            "Migrating legacy unbounded snapshot ({} ids) to bounded format",
            legacy.len()
        );
        Ok(DedupStore::from_legacy(capacity, legacy))
    }

    async fn try_load(&self, capacity: usize) -> Result<Option<DedupStore>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(Self::parse(&bytes, capacity)?)),
            None => Ok(None),
        }
    }

    async fn try_save(&self, store: &DedupStore) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&store.snapshot())?;
        self.write_bytes(&bytes).await
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn load(&self, capacity: usize) -> DedupStore {
        match self.try_load(capacity).await {
            Ok(Some(store)) => {
                log::info!(
                    "Loaded {} handled ids from {}",
                    store.len(),
                    self.path.display()
                );
                store
            }
            Ok(None) => {
                log::info!("No snapshot at {}, starting empty", self.path.display());
                DedupStore::new(capacity)
            }
            Err(e) => {
                log::warn!(
                    "Snapshot load failed from {}: {}. Starting empty.",
                    self.path.display(),
                    e
                );
                DedupStore::new(capacity)
            }
        }
    }

    async fn save(&self, store: &DedupStore) {
        if let Err(e) = self.try_save(store).await {
            log::warn!(
                "Snapshot save failed to {}: {}. In-memory state remains authoritative.",
                self.path.display(),
                e
            );
        }
    }
}
