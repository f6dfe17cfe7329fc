//! Joining audio tracks into one continuous, canonical-format file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use reel_models::encoding::{CANONICAL_AUDIO_CODEC, CANONICAL_SAMPLE_RATE};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{audio_combine_graph, AUDIO_OUT_LABEL};

/// Default fade applied at track joins, in seconds.
pub const DEFAULT_FADE_SECS: f64 = 1.0;

/// Default silence inserted between tracks, in seconds.
pub const DEFAULT_SILENCE_GAP_SECS: f64 = 0.5;

/// An input track with its resolved duration.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration: f64,
}

impl AudioTrack {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    /// File name for summaries and logs.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// The single audio file produced by [`AudioTrackCombiner::combine`].
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAudio {
    pub path: PathBuf,
    pub total_duration: f64,
    pub track_count: usize,
}

/// Fade and gap parameters for joining tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioCombineSettings {
    pub fade_duration: f64,
    pub silence_gap: f64,
}

impl Default for AudioCombineSettings {
    fn default() -> Self {
        Self {
            fade_duration: DEFAULT_FADE_SECS,
            silence_gap: DEFAULT_SILENCE_GAP_SECS,
        }
    }
}

/// Where one track lands on the combined timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPlacement {
    pub index: usize,
    pub file_name: String,
    pub duration: f64,
    pub start_time: f64,
    pub end_time: f64,
}

/// Layout of a combination, computable without running the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPlan {
    pub tracks: Vec<TrackPlacement>,
    pub total_duration: f64,
    /// Human-readable length such as `3:05`
    pub estimated_length: String,
}

/// Total length of `tracks` joined with `gap` seconds between neighbours.
pub fn combined_duration(tracks: &[AudioTrack], gap: f64) -> f64 {
    let sum: f64 = tracks.iter().map(|t| t.duration).sum();
    sum + gap.max(0.0) * tracks.len().saturating_sub(1) as f64
}

/// Format seconds as `m:ss`.
pub fn format_clock(seconds: f64) -> String {
    let whole = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Joins tracks with fades and silence into a canonical WAV file.
#[derive(Debug, Clone, Default)]
pub struct AudioTrackCombiner {
    settings: AudioCombineSettings,
}

impl AudioTrackCombiner {
    pub fn new(settings: AudioCombineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> AudioCombineSettings {
        self.settings
    }

    /// Describe where each track will land, without touching any file.
    pub fn plan(&self, tracks: &[AudioTrack]) -> AudioPlan {
        let gap = self.settings.silence_gap.max(0.0);
        let mut cursor = 0.0;
        let placements = tracks
            .iter()
            .enumerate()
            .map(|(index, track)| {
                let start = cursor;
                let end = start + track.duration;
                cursor = end + gap;
                TrackPlacement {
                    index,
                    file_name: track.file_name(),
                    duration: track.duration,
                    start_time: start,
                    end_time: end,
                }
            })
            .collect();

        let total = combined_duration(tracks, gap);
        AudioPlan {
            tracks: placements,
            total_duration: total,
            estimated_length: format_clock(total),
        }
    }

    /// Build the encoder command that writes the combined track to `output`.
    pub fn build_command(&self, tracks: &[AudioTrack], output: &Path) -> MediaResult<FfmpegCommand> {
        let (first, rest) = tracks
            .split_first()
            .ok_or_else(|| MediaError::invalid_input("no audio tracks supplied"))?;

        let canonical_output = |cmd: FfmpegCommand| {
            cmd.no_video()
                .audio_codec(CANONICAL_AUDIO_CODEC)
                .output_arg("-ar")
                .output_arg(CANONICAL_SAMPLE_RATE.to_string())
                .output_args(["-ac", "2"])
        };

        if rest.is_empty() {
            return Ok(canonical_output(FfmpegCommand::new(&first.path, output)));
        }

        let durations: Vec<f64> = tracks.iter().map(|t| t.duration).collect();
        let graph = audio_combine_graph(
            &durations,
            self.settings.fade_duration,
            self.settings.silence_gap,
        );

        let cmd = rest
            .iter()
            .fold(FfmpegCommand::new(&first.path, output), |cmd, track| {
                cmd.add_input(&track.path)
            })
            .filter_complex(graph)
            .map(AUDIO_OUT_LABEL);
        Ok(canonical_output(cmd))
    }

    /// Produce one continuous audio file from `tracks`, in order.
    ///
    /// A single track is transcoded to the canonical format unchanged.
    /// The reported total is computed from the resolved durations.
    pub async fn combine(
        &self,
        tracks: &[AudioTrack],
        output: &Path,
        runner: &FfmpegRunner,
    ) -> MediaResult<CombinedAudio> {
        for track in tracks {
            if !track.path.exists() {
                return Err(MediaError::FileNotFound(track.path.clone()));
            }
        }

        let cmd = self.build_command(tracks, output)?;
        runner.run(&cmd).await?;

        let total_duration = combined_duration(tracks, self.settings.silence_gap);
        info!(
            tracks = tracks.len(),
            total_duration,
            output = %output.display(),
            "Combined audio"
        );

        Ok(CombinedAudio {
            path: output.to_path_buf(),
            total_duration,
            track_count: tracks.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(durations: &[f64]) -> Vec<AudioTrack> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| AudioTrack::new(format!("/music/track{}.mp3", i + 1), *d))
            .collect()
    }

    #[test]
    fn test_combined_duration_law() {
        let t = tracks(&[10.0, 8.0, 12.0]);
        assert!((combined_duration(&t, 0.5) - 31.0).abs() < 1e-9);
        assert!((combined_duration(&t[..1], 0.5) - 10.0).abs() < 1e-9);
        assert_eq!(combined_duration(&[], 0.5), 0.0);
    }

    #[test]
    fn test_plan_places_tracks_with_gaps() {
        let combiner = AudioTrackCombiner::default();
        let plan = combiner.plan(&tracks(&[10.0, 8.0, 12.0]));

        let starts: Vec<f64> = plan.tracks.iter().map(|t| t.start_time).collect();
        assert_eq!(starts, vec![0.0, 10.5, 19.0]);
        assert_eq!(plan.tracks[2].end_time, 31.0);
        assert_eq!(plan.tracks[0].file_name, "track1.mp3");
        assert_eq!(plan.estimated_length, "0:31");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(185.4), "3:05");
        assert_eq!(format_clock(-2.0), "0:00");
    }

    #[test]
    fn test_single_track_is_plain_transcode() {
        let cmd = AudioTrackCombiner::default()
            .build_command(&tracks(&[42.0]), Path::new("/work/audio.wav"))
            .unwrap();
        let args = cmd.build_args();
        assert_eq!(cmd.input_count(), 1);
        assert!(!args.contains(&"-filter_complex".to_string()));
        assert!(args.contains(&"pcm_s16le".to_string()));
        assert!(args.contains(&"44100".to_string()));
    }

    #[test]
    fn test_multi_track_uses_filter_graph() {
        let cmd = AudioTrackCombiner::default()
            .build_command(&tracks(&[10.0, 8.0, 12.0]), Path::new("/work/audio.wav"))
            .unwrap();
        let args = cmd.build_args();
        assert_eq!(cmd.input_count(), 3);
        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[graph_pos + 1].contains("concat=n=5:v=0:a=1"));
        assert!(args.contains(&"[aout]".to_string()));
    }

    #[test]
    fn test_empty_track_list_is_rejected() {
        let err = AudioTrackCombiner::default()
            .build_command(&[], Path::new("/work/audio.wav"))
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_combine_reports_vanished_track() {
        let runner = FfmpegRunner::new();
        let err = AudioTrackCombiner::default()
            .combine(
                &tracks(&[3.0]),
                Path::new("/tmp/never-written.wav"),
                &runner,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
