//! Preview storage backends.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use reel_media::remove_file_best_effort;
use reel_models::{PreviewEntry, PreviewId};

use crate::error::PreviewResult;

/// Key-value storage for previews with per-entry expiry.
///
/// An expired entry is indistinguishable from one that was never stored.
#[async_trait]
pub trait PreviewStore: Send + Sync {
    /// Store `entry` under its id for `ttl`, replacing any previous value.
    async fn put(&self, entry: PreviewEntry, ttl: Duration) -> PreviewResult<()>;

    async fn get(&self, id: &PreviewId) -> PreviewResult<Option<PreviewEntry>>;

    /// Remove an entry. Returns whether a live entry was removed.
    async fn delete(&self, id: &PreviewId) -> PreviewResult<bool>;

    /// Atomically read and remove an entry. At most one caller gets a hit.
    async fn take(&self, id: &PreviewId) -> PreviewResult<Option<PreviewEntry>>;

    async fn exists(&self, id: &PreviewId) -> PreviewResult<bool> {
        Ok(self.get(id).await?.is_some())
    }
}

#[derive(Debug, Clone)]
struct Stored {
    entry: PreviewEntry,
    expires_at: Instant,
}

impl Stored {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local store. Expired entries are hidden immediately and
/// physically removed by [`MemoryPreviewStore::sweep`].
#[derive(Debug, Default)]
pub struct MemoryPreviewStore {
    entries: RwLock<HashMap<PreviewId, Stored>>,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop expired entries and their local files. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<PreviewEntry> = {
            let mut entries = self.entries.write().await;
            let ids: Vec<PreviewId> = entries
                .iter()
                .filter(|(_, stored)| !stored.is_live(now))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| entries.remove(id))
                .map(|stored| stored.entry)
                .collect()
        };

        for entry in &expired {
            if let Some(path) = entry.source.local_path() {
                remove_file_best_effort(path).await;
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Swept expired previews");
        }
        expired.len()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `shutdown` flips to `true`.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("Preview sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl PreviewStore for MemoryPreviewStore {
    async fn put(&self, entry: PreviewEntry, ttl: Duration) -> PreviewResult<()> {
        let stored = Stored {
            expires_at: Instant::now() + ttl,
            entry,
        };
        self.entries
            .write()
            .await
            .insert(stored.entry.id.clone(), stored);
        Ok(())
    }

    async fn get(&self, id: &PreviewId) -> PreviewResult<Option<PreviewEntry>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(id)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.entry.clone()))
    }

    async fn delete(&self, id: &PreviewId) -> PreviewResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(id)
            .is_some_and(|stored| stored.is_live(now)))
    }

    async fn take(&self, id: &PreviewId) -> PreviewResult<Option<PreviewEntry>> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(id)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.entry))
    }
}
