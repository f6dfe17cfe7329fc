//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use reel_models::ErrorKind;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Probe output is not a duration: {0:?}")]
    InvalidProbeOutput(String),

    #[error("Could not decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Duration unavailable for {path} ({})", attempts.join("; "))]
    DurationUnavailable {
        path: PathBuf,
        attempts: Vec<String>,
    },

    #[error("No usable assets: {0}")]
    NoUsableAssets(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a decode failure for a file.
    pub fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Machine-readable kind for the job boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::FfmpegNotFound
            | MediaError::FfprobeNotFound
            | MediaError::FfmpegFailed { .. }
            | MediaError::Timeout(_)
            | MediaError::Internal(_) => ErrorKind::EncoderFailure,
            MediaError::FfprobeFailed { .. }
            | MediaError::InvalidProbeOutput(_)
            | MediaError::DurationUnavailable { .. } => ErrorKind::DurationUnavailable,
            MediaError::Decode { .. }
            | MediaError::FileNotFound(_)
            | MediaError::Io(_)
            | MediaError::JsonParse(_) => ErrorKind::AssetUnreadable,
            MediaError::NoUsableAssets(_) => ErrorKind::NoUsableAssets,
            MediaError::InvalidInput(_) => ErrorKind::InputMissing,
            MediaError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Short caller-facing description without encoder stderr.
    pub fn public_message(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                message, exit_code, ..
            } => match exit_code {
                Some(code) => format!("{} (exit code {})", message, code),
                None => message.clone(),
            },
            MediaError::FfprobeFailed { message, .. } => message.clone(),
            MediaError::Io(_) => "File could not be read or written".to_string(),
            other => other.to_string(),
        }
    }
}
