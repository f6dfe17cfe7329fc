//! Boundaries to image generation services and durable storage.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use reel_media::move_file;
use reel_models::{PreviewEntry, PreviewSource, PromptParams};

use crate::error::{PreviewError, PreviewResult};

/// A text-to-image service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Name callers select the service by (e.g. `stable_diffusion`).
    fn service_name(&self) -> &str;

    /// Generate an image. Returns a local file or a remote URL.
    async fn generate(&self, params: &PromptParams) -> PreviewResult<PreviewSource>;
}

/// Moves an approved preview to durable storage.
#[async_trait]
pub trait ImagePromoter: Send + Sync {
    /// Returns the durable locator.
    async fn promote(&self, entry: &PreviewEntry) -> PreviewResult<String>;
}

/// Moves local previews into a durable directory. URLs are kept as-is.
#[derive(Debug, Clone)]
pub struct FsPromoter {
    durable_dir: PathBuf,
}

impl FsPromoter {
    pub fn new(durable_dir: impl Into<PathBuf>) -> Self {
        Self {
            durable_dir: durable_dir.into(),
        }
    }
}

#[async_trait]
impl ImagePromoter for FsPromoter {
    async fn promote(&self, entry: &PreviewEntry) -> PreviewResult<String> {
        match &entry.source {
            PreviewSource::ExternalUrl { url } => Ok(url.clone()),
            PreviewSource::LocalFile { path } => {
                let file_name = path.file_name().ok_or_else(|| {
                    PreviewError::promotion_failed(format!("{} has no file name", path.display()))
                })?;
                let target = self.durable_dir.join(file_name);
                move_file(path, &target).await?;
                info!(
                    preview_id = %entry.id,
                    target = %target.display(),
                    "Promoted preview"
                );
                Ok(target.to_string_lossy().into_owned())
            }
        }
    }
}
