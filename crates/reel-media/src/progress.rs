//! FFmpeg progress parsing and render progress reporting.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction (0.0-1.0) of an expected output length written so far.
    pub fn fraction_of(&self, expected_secs: f64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if expected_secs <= 0.0 || self.out_time_ms <= 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / expected_secs).clamp(0.0, 1.0)
    }

    /// Estimate time remaining in seconds.
    pub fn eta_seconds(&self, expected_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }
        let remaining = expected_secs - self.out_time_ms as f64 / 1000.0;
        if remaining <= 0.0 {
            return Some(0.0);
        }
        Some(remaining / self.speed)
    }
}

/// Phase of a render, reported alongside a 0.0-1.0 fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    /// Producing the video-only stream
    Visual,
    /// Combining the video stream with the audio track
    Mux,
}

/// Render progress event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderProgress {
    pub phase: RenderPhase,
    pub fraction: f64,
}

impl RenderProgress {
    pub fn new(phase: RenderPhase, fraction: f64) -> Self {
        Self {
            phase,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

/// Callback type for render progress updates.
pub type RenderProgressCallback = Arc<dyn Fn(RenderProgress) + Send + Sync>;

/// Maps a 0.0-1.0 fraction onto a slice of the job's percentage range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub start: u8,
    pub end: u8,
}

impl ProgressBand {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    pub fn percent(&self, fraction: f64) -> u8 {
        let span = self.end.saturating_sub(self.start) as f64;
        let f = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.start + (span * f).floor() as u8
    }
}
