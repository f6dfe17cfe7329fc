//! The composition pipeline: durations, audio, images, render, publish.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use reel_media::progress::{RenderPhase, RenderProgress, RenderProgressCallback};
use reel_media::{
    move_file, prepare_all, probe_video_with_timeout, sanitize_file_component,
    AudioCombineSettings, AudioTrack, AudioTrackCombiner, CompositorSettings, DurationResolver,
    FfmpegRunner, MediaError, ProgressBand, RenderRequest, SegmentCompositor,
};
use reel_models::{AudioSummary, CompositionResult, ErrorKind, JobStep};

use crate::config::WorkerConfig;
use crate::controller::{CompositionRequest, JobContext, JobHandler};
use crate::error::{WorkerError, WorkerResult};

const RENDER_BAND: ProgressBand = ProgressBand::new(40, 85);
const MUX_BAND: ProgressBand = ProgressBand::new(85, 95);
const DEFAULT_LABEL: &str = "composition";

/// Tracks whose duration is known, plus the file names that were dropped.
struct ResolvedTracks {
    tracks: Vec<AudioTrack>,
    skipped: Vec<String>,
}

/// Turns audio files and still images into one published video.
pub struct CompositionPipeline {
    config: WorkerConfig,
    resolver: Arc<DurationResolver>,
    combiner: AudioTrackCombiner,
    compositor: SegmentCompositor,
}

impl CompositionPipeline {
    pub fn new(config: WorkerConfig) -> Self {
        let resolver = DurationResolver::with_timeout(config.probe_timeout);
        let combiner = AudioTrackCombiner::new(AudioCombineSettings {
            fade_duration: config.fade_duration,
            silence_gap: config.silence_gap,
        });
        let compositor = SegmentCompositor::new(CompositorSettings {
            encoding: config.encoding.clone(),
            crossfade_segment_limit: config.crossfade_segment_limit,
        });
        Self {
            config,
            resolver: Arc::new(resolver),
            combiner,
            compositor,
        }
    }

    /// Replace the duration strategy chain.
    pub fn with_resolver(mut self, resolver: DurationResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Resolve every track's duration, skipping tracks that fail.
    async fn resolve_tracks(
        &self,
        paths: &[PathBuf],
        ctx: &JobContext,
    ) -> WorkerResult<ResolvedTracks> {
        let mut tracks = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();
        let mut first_duration_error: Option<MediaError> = None;
        let mut other_failures = 0usize;

        for (i, path) in paths.iter().enumerate() {
            ctx.ensure_not_cancelled()?;
            match self.resolver.resolve(path).await {
                Ok(duration) => tracks.push(AudioTrack::new(path.clone(), duration)),
                Err(e) => {
                    ctx.logger.log_warning(&format!(
                        "Skipping audio file {}: {}",
                        path.display(),
                        e
                    ));
                    skipped.push(display_name(path));
                    if e.kind() == ErrorKind::DurationUnavailable {
                        first_duration_error.get_or_insert(e);
                    } else {
                        other_failures += 1;
                    }
                }
            }
            let percent = 5 + ((i + 1) * 5 / paths.len()) as u8;
            ctx.progress.report(
                JobStep::ResolvingDurations,
                percent,
                format!("Resolved {}/{} audio durations", i + 1, paths.len()),
            );
        }

        if tracks.is_empty() {
            return Err(match first_duration_error {
                Some(e) if other_failures == 0 => e.into(),
                _ => MediaError::NoUsableAssets(format!(
                    "none of the {} audio files could be read",
                    paths.len()
                ))
                .into(),
            });
        }
        Ok(ResolvedTracks { tracks, skipped })
    }

    async fn publish(&self, rendered: &Path, label: Option<&str>) -> WorkerResult<PathBuf> {
        let target = self.config.output_dir.join(output_file_name(label));
        move_file(rendered, &target).await?;
        Ok(target)
    }
}

/// `video_<label>_<8 hex>.mp4`, safe to use as a single path component.
pub fn output_file_name(label: Option<&str>) -> String {
    let label = label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LABEL);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("video_{}_{}.mp4", sanitize_file_component(label), &suffix[..8])
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn render_progress_reporter(ctx: &JobContext) -> RenderProgressCallback {
    let reporter = ctx.progress.clone();
    Arc::new(move |progress: RenderProgress| match progress.phase {
        RenderPhase::Visual => {
            reporter.report(
                JobStep::Rendering,
                RENDER_BAND.percent(progress.fraction),
                "Rendering video",
            );
        }
        RenderPhase::Mux => {
            reporter.report(
                JobStep::Muxing,
                MUX_BAND.percent(progress.fraction),
                "Adding audio track",
            );
        }
    })
}

#[async_trait]
impl JobHandler for CompositionPipeline {
    async fn run(
        &self,
        request: CompositionRequest,
        ctx: JobContext,
    ) -> WorkerResult<CompositionResult> {
        request.validate()?;
        ctx.logger
            .log_start(request.audio_paths.len(), request.image_paths.len());

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let workspace = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.config.work_dir)?;
        let runner = FfmpegRunner::new()
            .with_cancel(ctx.cancel.clone())
            .with_timeout(self.config.encoder_timeout);

        // 1. Durations
        let ResolvedTracks { tracks, skipped } =
            self.resolve_tracks(&request.audio_paths, &ctx).await?;
        if !skipped.is_empty() {
            warn!(
                used = tracks.len(),
                supplied = request.audio_paths.len(),
                skipped = ?skipped,
                "Some audio files were skipped"
            );
        }

        // 2. Audio
        ctx.ensure_not_cancelled()?;
        let message = format!("Combining {} audio files", tracks.len());
        ctx.logger.log_step(JobStep::CombiningAudio, 15, &message);
        ctx.progress.report(JobStep::CombiningAudio, 15, message);
        let combined = self
            .combiner
            .combine(&tracks, &workspace.path().join("audio.wav"), &runner)
            .await?;
        ctx.progress
            .report(JobStep::CombiningAudio, 20, "Audio combined");

        // 3. Images
        ctx.ensure_not_cancelled()?;
        let message = format!("Preparing {} images", request.image_paths.len());
        ctx.logger.log_step(JobStep::PreparingImages, 25, &message);
        ctx.progress.report(JobStep::PreparingImages, 25, message);
        let frames_dir = workspace.path().join("frames");
        tokio::fs::create_dir_all(&frames_dir).await?;
        let sources = request.image_paths.clone();
        let resolution = request.options.resolution;
        let images = tokio::task::spawn_blocking(move || prepare_all(&sources, resolution, &frames_dir))
            .await
            .map_err(|e| WorkerError::internal(format!("image preparation task failed: {}", e)))??;
        if images.len() < request.image_paths.len() {
            ctx.logger.log_warning(&format!(
                "{} of {} images could not be used",
                request.image_paths.len() - images.len(),
                request.image_paths.len()
            ));
        }
        ctx.progress
            .report(JobStep::PreparingImages, 30, "Images prepared");

        // 4. Render and mux
        ctx.ensure_not_cancelled()?;
        ctx.logger.log_step(JobStep::Rendering, 40, "Rendering video");
        ctx.progress.report(JobStep::Rendering, 40, "Rendering video");
        let rendered = workspace.path().join("output.mp4");
        let outcome = self
            .compositor
            .render(
                RenderRequest {
                    images: &images,
                    audio: &combined,
                    options: &request.options,
                    work_dir: workspace.path(),
                    output: &rendered,
                },
                &runner,
                render_progress_reporter(&ctx),
            )
            .await?;

        // 5. Publish
        ctx.ensure_not_cancelled()?;
        ctx.progress.report(JobStep::Finalizing, 95, "Saving video");
        let video_path = self.publish(&outcome.output, request.label.as_deref()).await?;
        let file_size_bytes = tokio::fs::metadata(&video_path).await?.len();
        let probed = probe_video_with_timeout(&video_path, self.config.probe_timeout).await;
        let duration_seconds = match probed {
            Ok(info) => info.duration,
            Err(e) => {
                warn!(error = %e, "Could not probe output, reporting audio length");
                combined.total_duration
            }
        };

        info!(
            strategy = outcome.strategy.as_str(),
            images = images.len(),
            tracks = tracks.len(),
            duration_seconds,
            output = %video_path.display(),
            "Composition finished"
        );

        Ok(CompositionResult {
            video_path,
            file_size_bytes,
            duration_seconds,
            resolution: request.options.resolution,
            image_count: images.len(),
            audio: AudioSummary {
                file_count: tracks.len(),
                total_duration: combined.total_duration,
                individual_files: tracks.iter().map(AudioTrack::file_name).collect(),
                skipped_files: skipped,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::JobLogger;
    use crate::registry::JobRegistry;
    use reel_media::{DurationProbe, MediaResult};
    use reel_models::JobId;

    /// Knows the length of `song.mp3` only.
    struct OneKnownProbe;

    #[async_trait]
    impl DurationProbe for OneKnownProbe {
        fn name(&self) -> &'static str {
            "one_known"
        }

        async fn probe(&self, path: &Path) -> MediaResult<f64> {
            if path.ends_with("song.mp3") {
                Ok(42.0)
            } else {
                Err(MediaError::decode(path, "no duration header"))
            }
        }
    }

    async fn context() -> JobContext {
        let job_id = JobId::new();
        let job = JobRegistry::new().insert(job_id.clone()).await;
        JobContext {
            logger: JobLogger::new(&job_id, "compose_video"),
            job_id,
            progress: job.reporter,
            cancel: job.cancel_rx,
        }
    }

    #[tokio::test]
    async fn test_unreadable_tracks_are_reported_as_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let song = dir.path().join("song.mp3");
        let noise = dir.path().join("noise.mp3");
        std::fs::write(&song, b"audio").unwrap();
        std::fs::write(&noise, b"audio").unwrap();
        let missing = dir.path().join("missing.mp3");

        let pipeline = CompositionPipeline::new(WorkerConfig::default())
            .with_resolver(DurationResolver::new(vec![Box::new(OneKnownProbe)]));
        let ctx = context().await;
        let resolved = pipeline
            .resolve_tracks(&[noise, song.clone(), missing], &ctx)
            .await
            .unwrap();

        assert_eq!(resolved.tracks, vec![AudioTrack::new(song, 42.0)]);
        assert_eq!(resolved.skipped, vec!["noise.mp3", "missing.mp3"]);
        assert_eq!(ctx.progress.current().percent, 10);
    }

    #[test]
    fn test_output_file_name() {
        let name = output_file_name(Some("Road trip / 2024"));
        assert!(name.starts_with("video_Road_trip___2024_"));
        assert!(name.ends_with(".mp4"));
        let suffix = &name["video_Road_trip___2024_".len()..name.len() - 4];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(output_file_name(None).starts_with("video_composition_"));
        assert!(output_file_name(Some("   ")).starts_with("video_composition_"));
        assert!(!output_file_name(Some("..")).contains(".._"));
    }
}
