//! Structured per-job logging.

use std::time::Duration;

use tracing::{error, info, warn, Span};

use reel_models::{JobError, JobId, JobStep};

/// Attaches the job id and operation to every lifecycle event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, audio_files: usize, image_files: usize) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            audio_files,
            image_files,
            "Job started"
        );
    }

    /// Log entry into a pipeline step.
    pub fn log_step(&self, step: JobStep, percent: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            step = step.as_str(),
            percent,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_failure(&self, error: &JobError, detail: &str) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            kind = error.kind.as_str(),
            detail,
            "Job failed: {}", error.message
        );
    }

    pub fn log_completion(&self, elapsed: Duration, output: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            elapsed_secs = elapsed.as_secs_f64(),
            output,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span wrapping the whole job task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = self.operation
        )
    }
}
