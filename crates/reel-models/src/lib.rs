//! Shared data models for the reelsmith composition core.
//!
//! This crate provides Serde-serializable types for:
//! - Composition jobs, their lifecycle and status snapshots
//! - Composition options (resolution, fps, transitions, effects)
//! - Encoding configuration
//! - The machine-readable error taxonomy
//! - Preview entries pending human approval

pub mod encoding;
pub mod error_kind;
pub mod job;
pub mod options;
pub mod preview;

// Re-export common types
pub use encoding::EncodingConfig;
pub use error_kind::{ErrorKind, JobError};
pub use job::{AudioSummary, CompositionResult, JobId, JobStage, JobStatus, JobStep};
pub use options::{
    CompositionOptions, ImageDistribution, OptionsError, Resolution, MAX_FPS, MIN_FPS,
};
pub use preview::{PreviewEntry, PreviewId, PreviewSource, PromptParams};
