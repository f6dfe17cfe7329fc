//! Rendering prepared images and a combined audio track into one video.
//!
//! Rendering is two-step: a video-only stream is produced first with one of
//! three strategies, then it is muxed with the audio. The mux ends at the
//! shorter stream, which is the only place the output is truncated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use reel_models::{CompositionOptions, EncodingConfig};

use crate::audio::CombinedAudio;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{concat_list, crossfade_graph, frame_count, still_segment_filter, VIDEO_OUT_LABEL};
use crate::image_prep::PreparedImage;
use crate::progress::{FfmpegProgress, RenderPhase, RenderProgress, RenderProgressCallback};
use crate::timing::TimingPlan;

/// Transition used when audio visualization is requested but unavailable.
pub const EFFECTS_MIN_TRANSITION_SECS: f64 = 2.0;

/// Above this many images, multi-track jobs use hard cuts.
pub const DEFAULT_CROSSFADE_SEGMENT_LIMIT: usize = 12;

/// How the video-only stream is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    /// One image held for the whole duration
    SingleImage,
    /// Per-image segments blended with cross-fades
    Crossfade,
    /// Per-image segments joined with hard cuts
    Concatenate,
}

impl RenderStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStrategy::SingleImage => "single_image",
            RenderStrategy::Crossfade => "crossfade",
            RenderStrategy::Concatenate => "concatenate",
        }
    }
}

/// Pick a render strategy. Deterministic for the same inputs.
pub fn select_strategy(
    image_count: usize,
    track_count: usize,
    transition: f64,
    crossfade_segment_limit: usize,
) -> RenderStrategy {
    if image_count <= 1 {
        RenderStrategy::SingleImage
    } else if transition.is_nan() || transition <= 0.0 {
        RenderStrategy::Concatenate
    } else if track_count > 1 && image_count > crossfade_segment_limit {
        RenderStrategy::Concatenate
    } else {
        RenderStrategy::Crossfade
    }
}

/// Compositor tuning.
#[derive(Debug, Clone)]
pub struct CompositorSettings {
    pub encoding: EncodingConfig,
    pub crossfade_segment_limit: usize,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            encoding: EncodingConfig::default(),
            crossfade_segment_limit: DEFAULT_CROSSFADE_SEGMENT_LIMIT,
        }
    }
}

/// Inputs for one render.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub images: &'a [PreparedImage],
    pub audio: &'a CombinedAudio,
    pub options: &'a CompositionOptions,
    /// Scratch directory for segments and intermediates
    pub work_dir: &'a Path,
    pub output: &'a Path,
}

/// What a render produced.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub strategy: RenderStrategy,
    pub output: PathBuf,
    pub plan: TimingPlan,
}

/// Renders still images over an audio track.
#[derive(Debug, Clone, Default)]
pub struct SegmentCompositor {
    settings: CompositorSettings,
}

impl SegmentCompositor {
    pub fn new(settings: CompositorSettings) -> Self {
        Self { settings }
    }

    /// Transition length actually used for `options`.
    ///
    /// Audio visualization is not rendered; a longer cross-fade stands in.
    pub fn requested_transition(options: &CompositionOptions) -> f64 {
        if options.audio_visualization {
            options
                .transition_duration_seconds
                .max(EFFECTS_MIN_TRANSITION_SECS)
        } else {
            options.transition_duration_seconds
        }
    }

    /// Produce the final video at `request.output`.
    pub async fn render(
        &self,
        request: RenderRequest<'_>,
        runner: &FfmpegRunner,
        on_progress: RenderProgressCallback,
    ) -> MediaResult<RenderOutcome> {
        if request.images.is_empty() {
            return Err(MediaError::NoUsableAssets("no prepared images".to_string()));
        }
        if request.options.audio_visualization {
            warn!("Audio visualization is not supported; using a longer cross-fade instead");
        }

        let transition = Self::requested_transition(request.options);
        let strategy = select_strategy(
            request.images.len(),
            request.audio.track_count,
            transition,
            self.settings.crossfade_segment_limit,
        );
        let overlap = match strategy {
            RenderStrategy::Crossfade => transition,
            _ => 0.0,
        };
        let plan = TimingPlan::allocate(
            request.audio.total_duration,
            request.images.len(),
            overlap,
        )?;

        info!(
            strategy = strategy.as_str(),
            images = request.images.len(),
            total_duration = plan.total_duration,
            transition = plan.overlap,
            ken_burns = request.options.ken_burns,
            "Rendering video"
        );

        let visual = request.work_dir.join("visual.mp4");
        match strategy {
            RenderStrategy::SingleImage => {
                self.render_segment(
                    &request.images[0],
                    plan.total_duration,
                    request.options,
                    &visual,
                    runner,
                    progress_slice(&on_progress, 0.0, 1.0, plan.total_duration),
                )
                .await?;
            }
            RenderStrategy::Crossfade => {
                let segments = self
                    .render_segments(&request, &plan, runner, &on_progress, 0.6)
                    .await?;
                self.blend_crossfade(&segments, &plan, request.options, &visual, runner, &on_progress)
                    .await?;
            }
            RenderStrategy::Concatenate => {
                let segments = self
                    .render_segments(&request, &plan, runner, &on_progress, 0.95)
                    .await?;
                self.join_concat(&segments, request.work_dir, &visual, runner)
                    .await?;
            }
        }
        on_progress(RenderProgress::new(RenderPhase::Visual, 1.0));

        self.mux(&visual, request.audio, request.output, runner, &on_progress)
            .await?;

        Ok(RenderOutcome {
            strategy,
            output: request.output.to_path_buf(),
            plan,
        })
    }

    /// Render one still image as a video-only segment of `duration` seconds.
    async fn render_segment(
        &self,
        image: &PreparedImage,
        duration: f64,
        options: &CompositionOptions,
        output: &Path,
        runner: &FfmpegRunner,
        on_progress: impl Fn(FfmpegProgress) + Send + 'static,
    ) -> MediaResult<()> {
        let frames = frame_count(duration, options.fps);
        let filter = still_segment_filter(options.resolution, options.fps, frames, options.ken_burns);

        // zoompan emits `frames` frames from a single input frame.
        let mut cmd = FfmpegCommand::new(&image.path, output);
        if !options.ken_burns {
            cmd = cmd.loop_input();
        }
        let cmd = cmd
            .input_framerate(options.fps)
            .video_filter(filter)
            .output_duration(duration)
            .frame_rate(options.fps)
            .video_encoding(&self.settings.encoding)
            .no_audio();

        runner.run_with_progress(&cmd, on_progress).await
    }

    /// Render every timing entry to its own segment file.
    async fn render_segments(
        &self,
        request: &RenderRequest<'_>,
        plan: &TimingPlan,
        runner: &FfmpegRunner,
        on_progress: &RenderProgressCallback,
        share: f64,
    ) -> MediaResult<Vec<PathBuf>> {
        let total_render: f64 = plan.entries.iter().map(|e| e.render_duration).sum();
        let mut done = 0.0;
        let mut segments = Vec::with_capacity(plan.len());

        for entry in &plan.entries {
            runner.ensure_not_cancelled()?;

            let image = &request.images[entry.image_index];
            let output = request
                .work_dir
                .join(format!("seg_{:04}.mp4", entry.image_index));
            let base = share * done / total_render;
            let span = share * entry.render_duration / total_render;

            debug!(
                index = entry.image_index,
                duration = entry.render_duration,
                "Rendering segment"
            );
            self.render_segment(
                image,
                entry.render_duration,
                request.options,
                &output,
                runner,
                progress_slice(on_progress, base, span, entry.render_duration),
            )
            .await?;

            done += entry.render_duration;
            segments.push(output);
        }

        Ok(segments)
    }

    /// Blend segments into one stream with a chain of cross-fades.
    async fn blend_crossfade(
        &self,
        segments: &[PathBuf],
        plan: &TimingPlan,
        options: &CompositionOptions,
        output: &Path,
        runner: &FfmpegRunner,
        on_progress: &RenderProgressCallback,
    ) -> MediaResult<()> {
        runner.ensure_not_cancelled()?;
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| MediaError::internal("no segments to blend"))?;

        let graph = crossfade_graph(&plan.transition_offsets(), plan.overlap);
        let cmd = rest
            .iter()
            .fold(FfmpegCommand::new(first, output), |cmd, seg| cmd.add_input(seg))
            .filter_complex(graph)
            .map(VIDEO_OUT_LABEL)
            .frame_rate(options.fps)
            .video_encoding(&self.settings.encoding)
            .no_audio();

        runner
            .run_with_progress(
                &cmd,
                progress_slice(on_progress, 0.6, 0.4, plan.rendered_total()),
            )
            .await
    }

    /// Join segments with hard cuts, without re-encoding.
    async fn join_concat(
        &self,
        segments: &[PathBuf],
        work_dir: &Path,
        output: &Path,
        runner: &FfmpegRunner,
    ) -> MediaResult<()> {
        runner.ensure_not_cancelled()?;

        // Entries are relative to the list file, which sits beside the segments.
        let names: Vec<PathBuf> = segments
            .iter()
            .filter_map(|p| p.file_name().map(PathBuf::from))
            .collect();
        let list_path = work_dir.join("segments.txt");
        tokio::fs::write(&list_path, concat_list(&names)).await?;

        let cmd = FfmpegCommand::new(&list_path, output)
            .input_args(["-f", "concat", "-safe", "0"])
            .output_args(["-c", "copy"]);
        runner.run(&cmd).await
    }

    /// Combine the video-only stream with the audio track.
    async fn mux(
        &self,
        visual: &Path,
        audio: &CombinedAudio,
        output: &Path,
        runner: &FfmpegRunner,
        on_progress: &RenderProgressCallback,
    ) -> MediaResult<()> {
        runner.ensure_not_cancelled()?;

        let cmd = FfmpegCommand::new(visual, output)
            .add_input(&audio.path)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .audio_encoding(&self.settings.encoding)
            .shortest()
            .faststart();

        let callback = on_progress.clone();
        let expected = audio.total_duration;
        runner
            .run_with_progress(&cmd, move |p| {
                callback(RenderProgress::new(RenderPhase::Mux, p.fraction_of(expected)))
            })
            .await?;
        on_progress(RenderProgress::new(RenderPhase::Mux, 1.0));
        Ok(())
    }
}

/// Map one encoder invocation's progress onto `[base, base + span]` of the visual phase.
fn progress_slice(
    on_progress: &RenderProgressCallback,
    base: f64,
    span: f64,
    expected_secs: f64,
) -> impl Fn(FfmpegProgress) + Send + 'static {
    let callback = Arc::clone(on_progress);
    move |p: FfmpegProgress| {
        callback(RenderProgress::new(
            RenderPhase::Visual,
            base + span * p.fraction_of(expected_secs),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_image_always_single_strategy() {
        assert_eq!(select_strategy(1, 1, 1.0, 12), RenderStrategy::SingleImage);
        assert_eq!(select_strategy(1, 5, 0.0, 12), RenderStrategy::SingleImage);
    }

    #[test]
    fn test_zero_transition_uses_hard_cuts() {
        assert_eq!(select_strategy(3, 1, 0.0, 12), RenderStrategy::Concatenate);
    }

    #[test]
    fn test_many_images_with_many_tracks_use_hard_cuts() {
        assert_eq!(select_strategy(13, 2, 1.0, 12), RenderStrategy::Concatenate);
        assert_eq!(select_strategy(12, 2, 1.0, 12), RenderStrategy::Crossfade);
        // A single track keeps cross-fades regardless of image count.
        assert_eq!(select_strategy(40, 1, 1.0, 12), RenderStrategy::Crossfade);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let a = select_strategy(7, 3, 0.5, 12);
        let b = select_strategy(7, 3, 0.5, 12);
        assert_eq!(a, b);
    }

    #[test]
    fn test_visualization_lengthens_transition() {
        let mut options = CompositionOptions::default();
        assert_eq!(SegmentCompositor::requested_transition(&options), 1.0);
        options.audio_visualization = true;
        assert_eq!(
            SegmentCompositor::requested_transition(&options),
            EFFECTS_MIN_TRANSITION_SECS
        );
        options.transition_duration_seconds = 3.0;
        assert_eq!(SegmentCompositor::requested_transition(&options), 3.0);
    }

    #[tokio::test]
    async fn test_render_without_images_is_no_usable_assets() {
        let audio = CombinedAudio {
            path: PathBuf::from("/work/audio.wav"),
            total_duration: 10.0,
            track_count: 1,
        };
        let options = CompositionOptions::default();
        let request = RenderRequest {
            images: &[],
            audio: &audio,
            options: &options,
            work_dir: Path::new("/work"),
            output: Path::new("/work/out.mp4"),
        };
        let err = SegmentCompositor::default()
            .render(request, &FfmpegRunner::new(), Arc::new(|_: RenderProgress| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NoUsableAssets(_)));
    }
}
