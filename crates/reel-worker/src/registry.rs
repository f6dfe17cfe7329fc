//! In-memory job status registry.
//!
//! Each job owns a watch channel carrying its latest [`JobStatus`]; every
//! transition goes through [`watch::Sender::send_if_modified`], so readers
//! always see a consistent snapshot and terminal states stay put.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use reel_models::{JobError, JobId, JobStatus, JobStep};

/// Write side of one job's status channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    status: Arc<watch::Sender<JobStatus>>,
}

impl ProgressReporter {
    /// Advance the job. Ignored once the job is terminal.
    ///
    /// Repeats of the current step, percentage and message do not wake
    /// subscribers.
    pub fn report(&self, step: JobStep, percent: u8, message: impl Into<String>) -> bool {
        let message = message.into();
        self.status.send_if_modified(move |status| {
            let unchanged = status.step == Some(step)
                && status.percent >= percent.min(100)
                && status.message == message;
            !unchanged && status.advance(step, percent, message)
        })
    }

    pub fn current(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn succeed(&self, result: reel_models::CompositionResult) -> bool {
        self.status.send_if_modified(move |status| status.succeed(result))
    }

    pub(crate) fn fail(&self, error: JobError) -> bool {
        self.status.send_if_modified(move |status| status.fail(error))
    }
}

struct JobSlot {
    status: Arc<watch::Sender<JobStatus>>,
    cancel: watch::Sender<bool>,
}

/// Everything a job task needs from the registry.
pub struct RegisteredJob {
    pub reporter: ProgressReporter,
    pub cancel_rx: watch::Receiver<bool>,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobSlot>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in the `Pending` stage.
    pub async fn insert(&self, job_id: JobId) -> RegisteredJob {
        let (status_tx, _) = watch::channel(JobStatus::pending(job_id.clone()));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let status = Arc::new(status_tx);

        self.jobs.write().await.insert(
            job_id,
            JobSlot {
                status: status.clone(),
                cancel: cancel_tx,
            },
        );

        RegisteredJob {
            reporter: ProgressReporter { status },
            cancel_rx,
        }
    }

    pub async fn status(&self, job_id: &JobId) -> Option<JobStatus> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).map(|slot| slot.status.borrow().clone())
    }

    pub async fn subscribe(&self, job_id: &JobId) -> Option<watch::Receiver<JobStatus>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).map(|slot| slot.status.subscribe())
    }

    /// Mark the job cancelled and signal its running encoder.
    ///
    /// Returns whether the job is known. Terminal jobs are left unchanged.
    pub async fn cancel(&self, job_id: &JobId) -> bool {
        let jobs = self.jobs.read().await;
        match jobs.get(job_id) {
            Some(slot) => {
                if slot.status.send_if_modified(|status| status.cancel()) {
                    slot.cancel.send_replace(true);
                    debug!(job_id = %job_id, "Cancellation signalled");
                }
                true
            }
            None => false,
        }
    }

    /// Drop terminal jobs whose last update is older than `retention`.
    pub async fn purge_expired(&self, retention: Duration) -> usize {
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, slot| {
            let status = slot.status.borrow();
            if !status.is_terminal() {
                return true;
            }
            match (now - status.updated_at).to_std() {
                Ok(age) => age < retention,
                Err(_) => true,
            }
        });
        before - jobs.len()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{ErrorKind, JobStage};

    #[tokio::test]
    async fn test_insert_and_report() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        let job = registry.insert(id.clone()).await;

        assert_eq!(registry.status(&id).await.unwrap().stage, JobStage::Pending);

        assert!(job.reporter.report(JobStep::CombiningAudio, 20, "Combining"));
        let status = registry.status(&id).await.unwrap();
        assert_eq!(status.stage, JobStage::Running);
        assert_eq!(status.percent, 20);
    }

    #[tokio::test]
    async fn test_cancel_is_sticky_and_signals() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        let job = registry.insert(id.clone()).await;

        assert!(registry.cancel(&id).await);
        assert!(*job.cancel_rx.borrow());
        assert!(!job.reporter.report(JobStep::Rendering, 50, "late"));

        let status = registry.status(&id).await.unwrap();
        assert_eq!(status.stage, JobStage::Cancelled);
        assert_eq!(status.error.unwrap().kind, ErrorKind::Cancelled);

        assert!(!registry.cancel(&JobId::new()).await);
    }

    #[tokio::test]
    async fn test_purge_keeps_running_jobs() {
        let registry = JobRegistry::new();
        let running = JobId::new();
        let done = JobId::new();
        registry.insert(running.clone()).await;
        let finished = registry.insert(done.clone()).await;
        finished
            .reporter
            .fail(JobError::new(ErrorKind::EncoderFailure, "boom"));

        assert_eq!(registry.purge_expired(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.purge_expired(Duration::ZERO).await, 1);
        assert!(registry.status(&done).await.is_none());
        assert!(registry.status(&running).await.is_some());
    }
}
