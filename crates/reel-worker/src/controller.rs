//! Composition job controller.
//!
//! Accepts jobs, runs them on a bounded pool and tracks their status.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

use reel_media::remove_file_best_effort;
use reel_models::{CompositionOptions, CompositionResult, JobId, JobStatus, JobStep};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::registry::{JobRegistry, ProgressReporter};

/// A request to compose one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    pub audio_paths: Vec<PathBuf>,
    pub image_paths: Vec<PathBuf>,
    #[serde(default)]
    pub options: CompositionOptions,
    /// Human-readable tag used in the output file name
    #[serde(default)]
    pub label: Option<String>,
}

impl CompositionRequest {
    pub fn new(audio_paths: Vec<PathBuf>, image_paths: Vec<PathBuf>) -> Self {
        Self {
            audio_paths,
            image_paths,
            options: CompositionOptions::default(),
            label: None,
        }
    }

    pub fn with_options(mut self, options: CompositionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Reject requests that cannot possibly produce a video.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.audio_paths.is_empty() {
            return Err(WorkerError::input_missing("no audio files supplied"));
        }
        if self.image_paths.is_empty() {
            return Err(WorkerError::input_missing("no images supplied"));
        }
        self.options.validate()?;
        Ok(())
    }
}

/// What a running job gets from the controller.
pub struct JobContext {
    pub job_id: JobId,
    pub progress: ProgressReporter,
    /// Flips to `true` when the job is cancelled
    pub cancel: watch::Receiver<bool>,
    pub logger: JobLogger,
}

impl JobContext {
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn ensure_not_cancelled(&self) -> WorkerResult<()> {
        if self.is_cancelled() {
            Err(WorkerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Executes one composition.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(
        &self,
        request: CompositionRequest,
        ctx: JobContext,
    ) -> WorkerResult<CompositionResult>;
}

/// Runs composition jobs with bounded concurrency.
pub struct JobController {
    config: WorkerConfig,
    registry: Arc<JobRegistry>,
    handler: Arc<dyn JobHandler>,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobController {
    pub fn new(config: WorkerConfig, handler: Arc<dyn JobHandler>) -> Self {
        let permits = config.max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            handler,
            semaphore: Arc::new(Semaphore::new(permits)),
            shutdown,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Accept a job and schedule it. Returns immediately.
    pub async fn submit(&self, request: CompositionRequest) -> WorkerResult<JobId> {
        if *self.shutdown.borrow() {
            return Err(WorkerError::ShuttingDown);
        }

        let job_id = JobId::new();
        let job = self.registry.insert(job_id.clone()).await;
        let logger = JobLogger::new(&job_id, "compose_video");
        metrics::counter!("reel_jobs_submitted_total").increment(1);
        info!(
            job_id = %job_id,
            audio_files = request.audio_paths.len(),
            image_files = request.image_paths.len(),
            "Job accepted"
        );

        let ctx = JobContext {
            job_id: job_id.clone(),
            progress: job.reporter,
            cancel: job.cancel_rx,
            logger: logger.clone(),
        };
        let semaphore = Arc::clone(&self.semaphore);
        let handler = Arc::clone(&self.handler);

        tokio::spawn(
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        ctx.progress
                            .fail(WorkerError::ShuttingDown.to_job_error());
                        return;
                    }
                };
                execute(handler, request, ctx).await;
            }
            .instrument(logger.create_span()),
        );

        Ok(job_id)
    }

    pub async fn status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.registry.status(job_id).await
    }

    /// Watch a job's status as it changes.
    pub async fn subscribe(&self, job_id: &JobId) -> Option<watch::Receiver<JobStatus>> {
        self.registry.subscribe(job_id).await
    }

    /// Cancel a job. Never fails; terminal or unknown jobs are left alone.
    pub async fn cancel(&self, job_id: &JobId) -> bool {
        let known = self.registry.cancel(job_id).await;
        if known {
            info!(job_id = %job_id, "Cancel requested");
        }
        known
    }

    /// Call `on_update` with the job's current status and every later change,
    /// returning the terminal status.
    ///
    /// The current status is always delivered first, so a job that finished
    /// before this call returns at once.
    pub async fn follow<F>(&self, job_id: &JobId, mut on_update: F) -> WorkerResult<JobStatus>
    where
        F: FnMut(&JobStatus),
    {
        let mut rx = self
            .subscribe(job_id)
            .await
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))?;
        loop {
            let status = rx.borrow_and_update().clone();
            on_update(&status);
            if status.is_terminal() {
                return Ok(status);
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().clone();
                return Ok(last);
            }
        }
    }

    /// Wait until the job reaches a terminal stage.
    pub async fn wait(&self, job_id: &JobId) -> WorkerResult<JobStatus> {
        let mut rx = self
            .subscribe(job_id)
            .await
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))?;
        if let Ok(status) = rx.wait_for(|status| status.is_terminal()).await {
            return Ok(status.clone());
        }
        // Sender gone: the job was purged, report what we last saw.
        let last = rx.borrow().clone();
        Ok(last)
    }

    /// Periodically forget terminal jobs older than the retention window.
    pub fn spawn_retention_sweeper(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let retention = self.config.job_retention;
        let period = retention.min(Duration::from_secs(60)).max(Duration::from_secs(1));
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = registry.purge_expired(retention).await;
                        if purged > 0 {
                            info!(purged, "Purged finished jobs");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    /// Stop accepting jobs and stop background tasks.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.semaphore.close();
    }
}

async fn execute(handler: Arc<dyn JobHandler>, request: CompositionRequest, ctx: JobContext) {
    let progress = ctx.progress.clone();
    let logger = ctx.logger.clone();
    let started = Instant::now();

    if progress.current().is_terminal() {
        // Cancelled while queued.
        record_finish(&progress, started);
        return;
    }
    progress.report(JobStep::ResolvingDurations, 5, "Initializing");

    // Run on its own task so a panicking handler still ends in `Failed`.
    let run = tokio::spawn(async move { handler.run(request, ctx).await }.in_current_span());
    let outcome = match run.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(WorkerError::internal("job handler panicked")),
        Err(e) => Err(WorkerError::internal(format!("job task failed: {}", e))),
    };

    match outcome {
        Ok(result) => {
            let output = result.video_path.clone();
            if progress.succeed(result) {
                logger.log_completion(started.elapsed(), &output.to_string_lossy());
            } else {
                // Cancelled after the render finished; the output is discarded.
                logger.log_warning("Job finished after cancellation, removing output");
                remove_file_best_effort(&output).await;
            }
        }
        Err(e) => {
            let job_error = e.to_job_error();
            if progress.fail(job_error.clone()) {
                logger.log_failure(&job_error, &e.to_string());
            } else {
                warn!(error = %e, "Job error after terminal state");
            }
        }
    }

    record_finish(&progress, started);
}

fn record_finish(progress: &ProgressReporter, started: Instant) {
    let stage = progress.current().stage;
    metrics::counter!("reel_jobs_finished_total", "outcome" => stage.as_str()).increment(1);
    metrics::histogram!("reel_job_duration_seconds").record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let ok = CompositionRequest::new(vec!["a.mp3".into()], vec!["1.png".into()]);
        assert!(ok.validate().is_ok());

        let no_audio = CompositionRequest::new(vec![], vec!["1.png".into()]);
        assert!(matches!(no_audio.validate(), Err(WorkerError::InputMissing(_))));

        let no_images = CompositionRequest::new(vec!["a.mp3".into()], vec![]);
        assert!(matches!(no_images.validate(), Err(WorkerError::InputMissing(_))));

        let mut options = CompositionOptions::default();
        options.fps = 0;
        let bad = ok.clone().with_options(options);
        assert!(matches!(bad.validate(), Err(WorkerError::InvalidOptions(_))));
    }

    #[test]
    fn test_request_json_shape() {
        let request: CompositionRequest = serde_json::from_str(
            r#"{"audioPaths":["a.mp3"],"imagePaths":["1.png","2.png"],"label":"trip"}"#,
        )
        .unwrap();
        assert_eq!(request.image_paths.len(), 2);
        assert_eq!(request.label.as_deref(), Some("trip"));
        assert_eq!(request.options, CompositionOptions::default());
    }
}
