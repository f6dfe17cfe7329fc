//! Composition job identity, lifecycle and status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{ErrorKind, JobError, Resolution};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle stage of a job. `Pending` is initial; the last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Pending => "pending",
            JobStage::Running => "running",
            JobStage::Succeeded => "succeeded",
            JobStage::Failed => "failed",
            JobStage::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStage::Succeeded | JobStage::Failed | JobStage::Cancelled
        )
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline step a running job is in, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
    ResolvingDurations,
    CombiningAudio,
    PreparingImages,
    Rendering,
    Muxing,
    Finalizing,
}

impl JobStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStep::ResolvingDurations => "resolving_durations",
            JobStep::CombiningAudio => "combining_audio",
            JobStep::PreparingImages => "preparing_images",
            JobStep::Rendering => "rendering",
            JobStep::Muxing => "muxing",
            JobStep::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the audio that went into a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSummary {
    pub file_count: usize,
    pub total_duration: f64,
    pub individual_files: Vec<String>,
    /// Supplied files left out because they were missing or unreadable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_files: Vec<String>,
}

/// Result record of a successful composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionResult {
    pub video_path: PathBuf,
    pub file_size_bytes: u64,
    pub duration_seconds: f64,
    pub resolution: Resolution,
    pub image_count: usize,
    pub audio: AudioSummary,
}

/// Point-in-time view of a job, as returned to pollers and subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: JobId,
    pub stage: JobStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<JobStep>,
    /// Progress percentage (0-100), never decreases
    pub percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CompositionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    /// Create a pending status for a freshly submitted job.
    pub fn pending(job_id: JobId) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            stage: JobStage::Pending,
            step: None,
            percent: 0,
            message: "Queued".to_string(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Move to (or stay in) `Running` at the given step.
    ///
    /// Steps only move forward and the percentage never decreases.
    /// Returns `false` and leaves the status untouched once terminal.
    pub fn advance(&mut self, step: JobStep, percent: u8, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.stage = JobStage::Running;
        if self.step.map_or(true, |current| step >= current) {
            self.step = Some(step);
        }
        self.percent = self.percent.max(percent.min(100));
        self.message = message.into();
        self.updated_at = Utc::now();
        true
    }

    /// Mark as succeeded with a result.
    pub fn succeed(&mut self, result: CompositionResult) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.stage = JobStage::Succeeded;
        self.percent = 100;
        self.message = "Video creation completed".to_string();
        self.result = Some(result);
        self.updated_at = Utc::now();
        true
    }

    /// Mark as failed. A `Cancelled` error kind routes to [`JobStatus::cancel`].
    pub fn fail(&mut self, error: JobError) -> bool {
        if error.kind == ErrorKind::Cancelled {
            return self.cancel();
        }
        if self.is_terminal() {
            return false;
        }
        self.stage = JobStage::Failed;
        self.message = error.message.clone();
        self.error = Some(error);
        self.updated_at = Utc::now();
        true
    }

    /// Mark as cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.stage = JobStage::Cancelled;
        self.message = "Cancelled".to_string();
        self.error = Some(JobError::cancelled());
        self.updated_at = Utc::now();
        true
    }
}
