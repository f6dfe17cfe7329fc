//! Media duration resolution and FFprobe inspection.
//!
//! Durations are resolved by an ordered chain of [`DurationProbe`] strategies.
//! The first strategy that yields a finite, strictly positive number wins;
//! anything else moves on to the next one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{MediaError, MediaResult};

/// Default per-call timeout for ffprobe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// A single way of determining how long a media file plays.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Duration in seconds. Implementations need not validate the value.
    async fn probe(&self, path: &Path) -> MediaResult<f64>;
}

/// Parse a probe's textual output strictly.
///
/// Empty output, `N/A`, non-numeric text, non-finite and non-positive
/// values are all rejected.
pub fn parse_duration_output(raw: &str) -> MediaResult<f64> {
    let trimmed = raw.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| MediaError::InvalidProbeOutput(trimmed.to_string()))?;
    accept_duration(value).ok_or_else(|| MediaError::InvalidProbeOutput(trimmed.to_string()))
}

/// A duration is usable only if it is finite and strictly positive.
pub fn accept_duration(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

async fn run_ffprobe(args: &[&str], path: &Path, timeout: Duration) -> MediaResult<String> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let mut command = Command::new("ffprobe");
    command
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| MediaError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe exited with status {:?}", output.status.code()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Container-level duration reported by ffprobe.
#[derive(Debug, Clone)]
pub struct FfprobeFormatProbe {
    timeout: Duration,
}

impl FfprobeFormatProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DurationProbe for FfprobeFormatProbe {
    fn name(&self) -> &'static str {
        "ffprobe-format"
    }

    async fn probe(&self, path: &Path) -> MediaResult<f64> {
        let stdout = run_ffprobe(
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
            path,
            self.timeout,
        )
        .await?;
        parse_duration_output(&stdout)
    }
}

/// Duration of the first audio stream as reported by ffprobe.
#[derive(Debug, Clone)]
pub struct FfprobeStreamProbe {
    timeout: Duration,
}

impl FfprobeStreamProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DurationProbe for FfprobeStreamProbe {
    fn name(&self) -> &'static str {
        "ffprobe-stream"
    }

    async fn probe(&self, path: &Path) -> MediaResult<f64> {
        let stdout = run_ffprobe(
            &[
                "-v",
                "error",
                "-select_streams",
                "a:0",
                "-show_entries",
                "stream=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
            path,
            self.timeout,
        )
        .await?;
        // Some containers print one line per stream; take the first.
        let first = stdout.lines().next().unwrap_or_default();
        parse_duration_output(first)
    }
}

/// In-process container parse using symphonia's frame count.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaProbe;

#[async_trait]
impl DurationProbe for SymphoniaProbe {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    async fn probe(&self, path: &Path) -> MediaResult<f64> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || symphonia_duration(&path))
            .await
            .map_err(|e| MediaError::internal(format!("duration probe task failed: {}", e)))?
    }
}

fn symphonia_duration(path: &Path) -> MediaResult<f64> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MediaError::decode(path, e.to_string()))?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| MediaError::decode(path, "no default track"))?;
    let params = &track.codec_params;
    let frames = params
        .n_frames
        .ok_or_else(|| MediaError::decode(path, "frame count unknown"))?;

    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(frames);
        return Ok(time.seconds as f64 + time.frac);
    }
    match params.sample_rate {
        Some(rate) if rate > 0 => Ok(frames as f64 / rate as f64),
        _ => Err(MediaError::decode(path, "no time base or sample rate")),
    }
}

/// Resolves media durations through an ordered list of strategies.
pub struct DurationResolver {
    strategies: Vec<Box<dyn DurationProbe>>,
}

impl DurationResolver {
    /// Use a custom strategy chain.
    pub fn new(strategies: Vec<Box<dyn DurationProbe>>) -> Self {
        Self { strategies }
    }

    /// Standard chain: container duration, in-process parse, stream duration.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(vec![
            Box::new(FfprobeFormatProbe::new(timeout)),
            Box::new(SymphoniaProbe),
            Box::new(FfprobeStreamProbe::new(timeout)),
        ])
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve the duration of `path` in seconds.
    ///
    /// Fails with `FileNotFound` if the file is absent, and with
    /// `DurationUnavailable` once every strategy has failed.
    pub async fn resolve(&self, path: &Path) -> MediaResult<f64> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.probe(path).await {
                Ok(value) => match accept_duration(value) {
                    Some(duration) => {
                        debug!(
                            path = %path.display(),
                            strategy = strategy.name(),
                            duration,
                            "Resolved duration"
                        );
                        return Ok(duration);
                    }
                    None => attempts.push(format!("{}: unusable value {}", strategy.name(), value)),
                },
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        strategy = strategy.name(),
                        error = %e,
                        "Duration strategy failed"
                    );
                    attempts.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        warn!(path = %path.display(), attempts = attempts.len(), "No duration strategy succeeded");
        Err(MediaError::DurationUnavailable {
            path: path.to_path_buf(),
            attempts,
        })
    }
}

impl Default for DurationResolver {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_PROBE_TIMEOUT)
    }
}

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Whether an audio stream is present
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a rendered video for its shape and length.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    probe_video_with_timeout(path, DEFAULT_PROBE_TIMEOUT).await
}

/// [`probe_video`] with an explicit ffprobe deadline.
pub async fn probe_video_with_timeout(
    path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let stdout = run_ffprobe(
        &[
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ],
        path,
        timeout,
    )
    .await?;

    parse_video_info(&stdout, path)
}

fn parse_video_info(json: &str, path: &Path) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::decode(PathBuf::from(path), "no video stream"))?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .or(video_stream.r_frame_rate.as_deref())
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Strategy returning a scripted answer and counting calls.
    struct Scripted {
        name: &'static str,
        answer: Result<f64, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DurationProbe for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn probe(&self, _path: &Path) -> MediaResult<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .map_err(|msg| MediaError::InvalidProbeOutput(msg.to_string()))
        }
    }

    fn scripted(
        name: &'static str,
        answer: Result<f64, &'static str>,
    ) -> (Box<dyn DurationProbe>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Scripted {
                name,
                answer,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[test]
    fn test_parse_duration_output_is_strict() {
        assert!((parse_duration_output("12.345\n").unwrap() - 12.345).abs() < 1e-9);
        assert!(parse_duration_output("").is_err());
        assert!(parse_duration_output("N/A").is_err());
        assert!(parse_duration_output("0").is_err());
        assert!(parse_duration_output("-3.0").is_err());
        assert!(parse_duration_output("inf").is_err());
        assert!(parse_duration_output("NaN").is_err());
    }

    #[tokio::test]
    async fn test_first_usable_strategy_wins() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (a, a_calls) = scripted("a", Err("N/A"));
        let (b, b_calls) = scripted("b", Ok(0.0));
        let (c, c_calls) = scripted("c", Ok(42.5));
        let (d, d_calls) = scripted("d", Ok(1.0));

        let resolver = DurationResolver::new(vec![a, b, c, d]);
        let duration = resolver.resolve(file.path()).await.unwrap();

        assert!((duration - 42.5).abs() < 1e-9);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 1);
        assert_eq!(d_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_strategies_failing_is_duration_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (a, _) = scripted("a", Err("garbage"));
        let (b, _) = scripted("b", Ok(f64::NAN));

        let resolver = DurationResolver::new(vec![a, b]);
        let err = resolver.resolve(file.path()).await.unwrap_err();

        match err {
            MediaError::DurationUnavailable { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("a:"));
                assert!(attempts[1].starts_with("b:"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_not_probed() {
        let (a, calls) = scripted("a", Ok(3.0));
        let resolver = DurationResolver::new(vec![a]);
        let err = resolver
            .resolve(Path::new("/definitely/not/here.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_symphonia_rejects_non_audio() {
        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"this is not audio").unwrap();
        assert!(SymphoniaProbe.probe(file.path()).await.is_err());
    }

    #[test]
    fn test_default_chain_order() {
        let resolver = DurationResolver::default();
        assert_eq!(
            resolver.strategy_names(),
            vec!["ffprobe-format", "symphonia", "ffprobe-stream"]
        );
    }

    #[test]
    fn test_parse_video_info() {
        let json = r#"{
            "format": {"duration": "60.021000", "size": "1048576"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                 "r_frame_rate": "30/1", "avg_frame_rate": "30/1"},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let info = parse_video_info(json, Path::new("out.mp4")).unwrap();
        assert!((info.duration - 60.021).abs() < 1e-6);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 30.0).abs() < 0.01);
        assert!(info.has_audio);
        assert_eq!(info.size, 1_048_576);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }
}
