//! Preview cache error types.

use thiserror::Error;

use reel_media::MediaError;
use reel_models::{ErrorKind, PreviewId};

pub type PreviewResult<T> = Result<T, PreviewError>;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Preview not found or expired: {0}")]
    NotFound(PreviewId),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Unknown image service: {0}")]
    UnknownService(String),

    #[error("Image generation failed: {0}")]
    GenerationFailed(String),

    #[error("Promotion failed: {0}")]
    PromotionFailed(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl PreviewError {
    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn promotion_failed(msg: impl Into<String>) -> Self {
        Self::PromotionFailed(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PreviewError::NotFound(_) => ErrorKind::InputMissing,
            PreviewError::InvalidPrompt(_) | PreviewError::UnknownService(_) => {
                ErrorKind::InvalidOptions
            }
            PreviewError::Media(e) => e.kind(),
            PreviewError::GenerationFailed(_)
            | PreviewError::PromotionFailed(_)
            | PreviewError::Redis(_)
            | PreviewError::Json(_) => ErrorKind::AssetUnreadable,
        }
    }
}
