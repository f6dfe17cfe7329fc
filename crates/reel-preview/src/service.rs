//! Create, approve and reject generated-image previews.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use reel_media::remove_file_best_effort;
use reel_models::{PreviewEntry, PreviewId, PromptParams};

use crate::config::PreviewConfig;
use crate::error::{PreviewError, PreviewResult};
use crate::generator::{FsPromoter, ImageGenerator, ImagePromoter};
use crate::store::PreviewStore;

/// Returned from [`PreviewService::create_preview`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewHandle {
    pub preview_id: PreviewId,
    /// Local path or URL the caller can display
    pub locator: String,
}

pub struct PreviewService {
    store: Arc<dyn PreviewStore>,
    generators: HashMap<String, Arc<dyn ImageGenerator>>,
    promoter: Arc<dyn ImagePromoter>,
    ttl: Duration,
}

impl PreviewService {
    pub fn new(store: Arc<dyn PreviewStore>, promoter: Arc<dyn ImagePromoter>, ttl: Duration) -> Self {
        Self {
            store,
            generators: HashMap::new(),
            promoter,
            ttl,
        }
    }

    /// Promote into `config.durable_dir` and hold previews for `config.ttl`.
    pub fn from_config(config: &PreviewConfig, store: Arc<dyn PreviewStore>) -> Self {
        Self::new(
            store,
            Arc::new(FsPromoter::new(config.durable_dir.clone())),
            config.ttl,
        )
    }

    /// Register a generator under its service name.
    pub fn with_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.generators
            .insert(generator.service_name().to_string(), generator);
        self
    }

    /// Generate an image and hold it for approval.
    pub async fn create_preview(&self, params: PromptParams) -> PreviewResult<PreviewHandle> {
        params.validate().map_err(PreviewError::InvalidPrompt)?;
        let generator = self
            .generators
            .get(&params.service)
            .ok_or_else(|| PreviewError::UnknownService(params.service.clone()))?;

        let source = generator.generate(&params).await?;
        if let Some(path) = source.local_path() {
            if !path.exists() {
                return Err(PreviewError::generation_failed(format!(
                    "generator reported {} but it does not exist",
                    path.display()
                )));
            }
        }

        let entry = PreviewEntry::new(
            PreviewId::new(),
            params.prompt,
            generator.service_name(),
            source,
        );
        let handle = PreviewHandle {
            preview_id: entry.id.clone(),
            locator: entry.source.locator(),
        };
        self.store.put(entry, self.ttl).await?;

        metrics::counter!("reel_previews_created_total").increment(1);
        info!(preview_id = %handle.preview_id, service = %params.service, "Created preview");
        Ok(handle)
    }

    /// Look up a live preview.
    pub async fn get_preview(&self, id: &PreviewId) -> PreviewResult<Option<PreviewEntry>> {
        self.store.get(id).await
    }

    /// Promote a preview to durable storage.
    ///
    /// The entry is removed before promotion, so a second approval misses
    /// even if this promotion fails.
    pub async fn approve_preview(&self, id: &PreviewId) -> PreviewResult<String> {
        let entry = self
            .store
            .take(id)
            .await?
            .ok_or_else(|| PreviewError::NotFound(id.clone()))?;

        match self.promoter.promote(&entry).await {
            Ok(locator) => {
                metrics::counter!("reel_previews_approved_total").increment(1);
                info!(preview_id = %id, locator = %locator, "Approved preview");
                Ok(locator)
            }
            Err(e) => {
                warn!(preview_id = %id, error = %e, "Promotion failed after approval");
                Err(e)
            }
        }
    }

    /// Discard a preview and its local file. Unknown ids are a no-op.
    pub async fn reject_preview(&self, id: &PreviewId) -> PreviewResult<()> {
        match self.store.take(id).await? {
            Some(entry) => {
                if let Some(path) = entry.source.local_path() {
                    remove_file_best_effort(path).await;
                }
                metrics::counter!("reel_previews_rejected_total").increment(1);
                info!(preview_id = %id, "Rejected preview");
            }
            None => debug!(preview_id = %id, "Reject for unknown or expired preview"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FsPromoter;
    use crate::store::MemoryPreviewStore;
    use async_trait::async_trait;
    use reel_models::PreviewSource;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a small file per call into a scratch directory.
    struct FakeGenerator {
        dir: PathBuf,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        fn service_name(&self) -> &str {
            "stable_diffusion"
        }

        async fn generate(&self, _params: &PromptParams) -> PreviewResult<PreviewSource> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let path = self.dir.join(format!("sd_{}.png", n));
            tokio::fs::write(&path, b"png")
                .await
                .map_err(|e| PreviewError::generation_failed(e.to_string()))?;
            Ok(PreviewSource::LocalFile { path })
        }
    }

    struct FailingPromoter;

    #[async_trait]
    impl ImagePromoter for FailingPromoter {
        async fn promote(&self, _entry: &PreviewEntry) -> PreviewResult<String> {
            Err(PreviewError::promotion_failed("storage offline"))
        }
    }

    fn service(dir: &TempDir, promoter: Arc<dyn ImagePromoter>, ttl: Duration) -> PreviewService {
        PreviewService::new(Arc::new(MemoryPreviewStore::new()), promoter, ttl).with_generator(
            Arc::new(FakeGenerator {
                dir: dir.path().to_path_buf(),
                calls: AtomicUsize::new(0),
            }),
        )
    }

    #[tokio::test]
    async fn test_approve_then_get_misses() {
        let dir = TempDir::new().unwrap();
        let promoter = Arc::new(FsPromoter::new(dir.path().join("approved")));
        let svc = service(&dir, promoter, Duration::from_secs(60));

        let handle = svc.create_preview(PromptParams::new("a quiet lake")).await.unwrap();
        assert!(svc.get_preview(&handle.preview_id).await.unwrap().is_some());

        let durable = svc.approve_preview(&handle.preview_id).await.unwrap();
        assert!(PathBuf::from(&durable).exists());
        assert!(svc.get_preview(&handle.preview_id).await.unwrap().is_none());

        let again = svc.approve_preview(&handle.preview_id).await;
        assert!(matches!(again, Err(PreviewError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_promotion_still_consumes_entry() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(FailingPromoter), Duration::from_secs(60));

        let handle = svc.create_preview(PromptParams::new("forest")).await.unwrap();
        assert!(svc.approve_preview(&handle.preview_id).await.is_err());
        assert!(matches!(
            svc.approve_preview(&handle.preview_id).await,
            Err(PreviewError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_is_idempotent_and_removes_file() {
        let dir = TempDir::new().unwrap();
        let promoter = Arc::new(FsPromoter::new(dir.path().join("approved")));
        let svc = service(&dir, promoter, Duration::from_secs(60));

        let handle = svc.create_preview(PromptParams::new("desert")).await.unwrap();
        assert!(PathBuf::from(&handle.locator).exists());

        svc.reject_preview(&handle.preview_id).await.unwrap();
        assert!(!PathBuf::from(&handle.locator).exists());
        svc.reject_preview(&handle.preview_id).await.unwrap();
        svc.reject_preview(&PreviewId::from_string("never-existed"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_preview_cannot_be_approved() {
        let dir = TempDir::new().unwrap();
        let promoter = Arc::new(FsPromoter::new(dir.path().join("approved")));
        let svc = service(&dir, promoter, Duration::from_millis(20));

        let handle = svc.create_preview(PromptParams::new("city")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(svc.get_preview(&handle.preview_id).await.unwrap().is_none());
        assert!(matches!(
            svc.approve_preview(&handle.preview_id).await,
            Err(PreviewError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_prompt_and_service_are_validated() {
        let dir = TempDir::new().unwrap();
        let promoter = Arc::new(FsPromoter::new(dir.path().join("approved")));
        let svc = service(&dir, promoter, Duration::from_secs(60));

        assert!(matches!(
            svc.create_preview(PromptParams::new("")).await,
            Err(PreviewError::InvalidPrompt(_))
        ));
        assert!(matches!(
            svc.create_preview(PromptParams::new("x").with_service("midjourney"))
                .await,
            Err(PreviewError::UnknownService(_))
        ));
    }
}
