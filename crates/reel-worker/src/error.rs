//! Worker error types.

use thiserror::Error;

use reel_media::MediaError;
use reel_models::{ErrorKind, JobError, JobId, OptionsError};

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised while accepting or running a composition job.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Missing input: {0}")]
    InputMissing(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Worker is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn input_missing(msg: impl Into<String>) -> Self {
        Self::InputMissing(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-readable kind for the job boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::InputMissing(_) | WorkerError::JobNotFound(_) => ErrorKind::InputMissing,
            WorkerError::InvalidOptions(_) => ErrorKind::InvalidOptions,
            WorkerError::Media(e) => e.kind(),
            WorkerError::Io(_) => ErrorKind::AssetUnreadable,
            WorkerError::Cancelled => ErrorKind::Cancelled,
            WorkerError::ShuttingDown | WorkerError::Internal(_) => ErrorKind::EncoderFailure,
        }
    }

    /// Caller-facing error record. Encoder stderr stays in the logs.
    pub fn to_job_error(&self) -> JobError {
        let message = match self {
            WorkerError::Media(e) => e.public_message(),
            WorkerError::Io(_) => "File could not be read or written".to_string(),
            other => other.to_string(),
        };
        JobError::new(self.kind(), message)
    }
}
