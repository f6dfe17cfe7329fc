//! FFmpeg-driven building blocks for turning audio and still images into video.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation and timeouts
//! - Progress parsing from `-progress pipe:2`
//! - Layered duration resolution (ffprobe, symphonia)
//! - Letterboxing of source images onto the output canvas
//! - Equal-share timing plans with cross-fade compensation
//! - Audio track joining with fades and silence gaps
//! - Segment rendering, cross-fade blending, concatenation and muxing

pub mod audio;
pub mod command;
pub mod compositor;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod image_prep;
pub mod probe;
pub mod progress;
pub mod timing;

pub use audio::{
    combined_duration, AudioCombineSettings, AudioPlan, AudioTrack, AudioTrackCombiner,
    CombinedAudio, TrackPlacement,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{
    select_strategy, CompositorSettings, RenderOutcome, RenderRequest, RenderStrategy,
    SegmentCompositor,
};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, remove_file_best_effort, sanitize_file_component};
pub use image_prep::{fit_within, prepare_all, prepare_image, Placement, PreparedImage};
pub use probe::{
    probe_video, probe_video_with_timeout, DurationProbe, DurationResolver, VideoInfo,
};
pub use progress::{
    FfmpegProgress, ProgressBand, RenderPhase, RenderProgress, RenderProgressCallback,
};
pub use timing::{TimingEntry, TimingPlan};
