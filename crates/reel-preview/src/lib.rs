//! Preview/approval cache for generated images.
//!
//! A generated image is held here with a TTL until a human approves it
//! (promoted to durable storage) or rejects it (discarded with its file).
//! Two backends are provided: an in-process map with a sweeper, and Redis.

pub mod config;
pub mod error;
pub mod generator;
pub mod redis_store;
pub mod service;
pub mod store;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use config::PreviewConfig;
pub use error::{PreviewError, PreviewResult};
pub use generator::{FsPromoter, ImageGenerator, ImagePromoter};
pub use redis_store::RedisPreviewStore;
pub use service::{PreviewHandle, PreviewService};
pub use store::{MemoryPreviewStore, PreviewStore};

/// Build the store selected by `config`: Redis when a URL is set, memory otherwise.
///
/// The memory store gets a sweeper running every `config.sweep_interval`
/// until `shutdown` flips to `true`; its handle is returned alongside.
pub fn build_store(
    config: &PreviewConfig,
    shutdown: watch::Receiver<bool>,
) -> PreviewResult<(Arc<dyn PreviewStore>, Option<JoinHandle<()>>)> {
    match &config.redis_url {
        Some(url) => {
            let store: Arc<dyn PreviewStore> =
                Arc::new(RedisPreviewStore::new(url, config.key_prefix.clone())?);
            Ok((store, None))
        }
        None => {
            let memory = Arc::new(MemoryPreviewStore::new());
            let sweeper = memory.clone().spawn_sweeper(config.sweep_interval, shutdown);
            let store: Arc<dyn PreviewStore> = memory;
            Ok((store, Some(sweeper)))
        }
    }
}
