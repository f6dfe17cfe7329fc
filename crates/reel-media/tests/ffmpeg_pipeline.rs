//! End-to-end checks against a real FFmpeg install.
//!
//! Run with `cargo test -p reel-media -- --ignored`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use reel_media::{
    prepare_all, probe_video, probe_video_with_timeout, AudioCombineSettings, AudioTrack, AudioTrackCombiner,
    DurationResolver, FfmpegRunner, MediaError, RenderProgress, RenderRequest, RenderStrategy,
    SegmentCompositor,
};
use reel_models::{CompositionOptions, Resolution};

fn sine(dir: &Path, name: &str, seconds: f64, freq: u32) -> PathBuf {
    let path = dir.join(name);
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("sine=frequency={}:duration={}", freq, seconds))
        .arg(&path)
        .status()
        .expect("ffmpeg should be installed");
    assert!(status.success());
    path
}

fn still(dir: &Path, name: &str, w: u32, h: u32, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(w, h, Rgb(color)).save(&path).unwrap();
    path
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_resolver_reads_generated_audio() {
    let dir = TempDir::new().unwrap();
    let wav = sine(dir.path(), "tone.wav", 7.0, 440);
    let mp3 = sine(dir.path(), "tone.mp3", 7.0, 440);

    let resolver = DurationResolver::default();
    assert!((resolver.resolve(&wav).await.unwrap() - 7.0).abs() < 0.05);
    assert!((resolver.resolve(&mp3).await.unwrap() - 7.0).abs() < 0.1);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_combined_length_matches_law() {
    let dir = TempDir::new().unwrap();
    let tracks = vec![
        AudioTrack::new(sine(dir.path(), "a.wav", 10.0, 330), 10.0),
        AudioTrack::new(sine(dir.path(), "b.wav", 8.0, 440), 8.0),
        AudioTrack::new(sine(dir.path(), "c.wav", 12.0, 550), 12.0),
    ];
    let output = dir.path().join("combined.wav");

    let combiner = AudioTrackCombiner::new(AudioCombineSettings {
        fade_duration: 1.0,
        silence_gap: 0.5,
    });
    let combined = combiner
        .combine(&tracks, &output, &FfmpegRunner::new())
        .await
        .unwrap();

    assert_eq!(combined.track_count, 3);
    assert!((combined.total_duration - 31.0).abs() < 1e-9);

    let measured = DurationResolver::default().resolve(&output).await.unwrap();
    assert!(
        (measured - 31.0).abs() < 0.05,
        "combined audio is {measured}s"
    );
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_crossfade_render_matches_audio_length() {
    let dir = TempDir::new().unwrap();
    let frames_dir = dir.path().join("frames");
    std::fs::create_dir(&frames_dir).unwrap();

    let audio_src = sine(dir.path(), "song.wav", 6.0, 440);
    let combined = AudioTrackCombiner::default()
        .combine(
            &[AudioTrack::new(audio_src, 6.0)],
            &dir.path().join("audio.wav"),
            &FfmpegRunner::new(),
        )
        .await
        .unwrap();

    let resolution = Resolution::new(320, 240).unwrap();
    let sources = vec![
        still(dir.path(), "wide.png", 400, 100, [200, 20, 20]),
        still(dir.path(), "tall.png", 90, 300, [20, 200, 20]),
        still(dir.path(), "square.png", 50, 50, [20, 20, 200]),
    ];
    let images = prepare_all(&sources, resolution, &frames_dir).unwrap();

    let options = CompositionOptions {
        resolution,
        fps: 24,
        transition_duration_seconds: 0.5,
        ..CompositionOptions::default()
    };
    let output = dir.path().join("out.mp4");
    let outcome = SegmentCompositor::default()
        .render(
            RenderRequest {
                images: &images,
                audio: &combined,
                options: &options,
                work_dir: dir.path(),
                output: &output,
            },
            &FfmpegRunner::new(),
            Arc::new(|_: RenderProgress| {}),
        )
        .await
        .unwrap();

    assert_eq!(outcome.strategy, RenderStrategy::Crossfade);
    let info = probe_video(&output).await.unwrap();
    assert_eq!((info.width, info.height), (320, 240));
    assert!(info.has_audio);
    assert!((info.duration - 6.0).abs() < 0.1, "video is {}s", info.duration);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_probe_video_honours_timeout() {
    let dir = TempDir::new().unwrap();
    let wav = sine(dir.path(), "tone.wav", 2.0, 440);

    let result = probe_video_with_timeout(&wav, std::time::Duration::ZERO).await;
    assert!(matches!(result, Err(MediaError::Timeout(0))), "{:?}", result.err());
}
