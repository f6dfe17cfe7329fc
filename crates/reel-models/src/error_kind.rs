//! Machine-readable failure taxonomy exposed at the job boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No audio or no images were supplied
    InputMissing,
    /// File present but unreadable or corrupt (or vanished mid-job)
    AssetUnreadable,
    /// Every duration probing strategy failed
    DurationUnavailable,
    /// External encoder exited nonzero or timed out
    EncoderFailure,
    /// Every image or audio input failed preparation
    NoUsableAssets,
    /// The job was cancelled
    Cancelled,
    /// The options record failed validation
    InvalidOptions,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputMissing => "input_missing",
            ErrorKind::AssetUnreadable => "asset_unreadable",
            ErrorKind::DurationUnavailable => "duration_unavailable",
            ErrorKind::EncoderFailure => "encoder_failure",
            ErrorKind::NoUsableAssets => "no_usable_assets",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidOptions => "invalid_options",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure as reported to callers: a kind plus a human-readable cause.
///
/// Internal detail (encoder stderr, io errors) stays in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Job was cancelled")
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
