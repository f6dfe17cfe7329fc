//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reel_media::audio::{DEFAULT_FADE_SECS, DEFAULT_SILENCE_GAP_SECS};
use reel_media::compositor::DEFAULT_CROSSFADE_SEGMENT_LIMIT;
use reel_media::probe::DEFAULT_PROBE_TIMEOUT;
use reel_models::EncodingConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Timeout for a single encoder invocation
    pub encoder_timeout: Duration,
    /// Timeout for a single ffprobe invocation
    pub probe_timeout: Duration,
    /// Parent directory for per-job scratch directories
    pub work_dir: PathBuf,
    /// Where finished videos are published
    pub output_dir: PathBuf,
    /// How long terminal job statuses stay queryable
    pub job_retention: Duration,
    /// Fade length at audio track joins, in seconds
    pub fade_duration: f64,
    /// Silence between audio tracks, in seconds
    pub silence_gap: f64,
    /// Above this many images, multi-track jobs use hard cuts
    pub crossfade_segment_limit: usize,
    pub encoding: EncodingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            encoder_timeout: Duration::from_secs(1800),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            work_dir: PathBuf::from("/tmp/reelsmith"),
            output_dir: PathBuf::from("./uploads"),
            job_retention: Duration::from_secs(3600),
            fade_duration: DEFAULT_FADE_SECS,
            silence_gap: DEFAULT_SILENCE_GAP_SECS,
            crossfade_segment_limit: DEFAULT_CROSSFADE_SEGMENT_LIMIT,
            encoding: EncodingConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut encoding = defaults.encoding.clone();
        if let Some(crf) = env_parse("WORKER_CRF") {
            encoding = encoding.with_crf(crf);
        }
        if let Ok(preset) = std::env::var("WORKER_PRESET") {
            encoding = encoding.with_preset(preset);
        }

        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            encoder_timeout: env_parse("WORKER_ENCODER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.encoder_timeout),
            probe_timeout: env_parse("WORKER_PROBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("WORKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            job_retention: env_parse("WORKER_JOB_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_retention),
            fade_duration: env_parse("WORKER_FADE_SECS")
                .filter(|v: &f64| v.is_finite() && *v >= 0.0)
                .unwrap_or(defaults.fade_duration),
            silence_gap: env_parse("WORKER_SILENCE_GAP_SECS")
                .filter(|v: &f64| v.is_finite() && *v >= 0.0)
                .unwrap_or(defaults.silence_gap),
            crossfade_segment_limit: env_parse("WORKER_CROSSFADE_SEGMENT_LIMIT")
                .unwrap_or(defaults.crossfade_segment_limit),
            encoding,
        }
    }
}
