//! Encoder settings for rendered segments and the final container.

use serde::{Deserialize, Serialize};

/// Canonical intermediate audio format produced by the combiner.
pub const CANONICAL_AUDIO_CODEC: &str = "pcm_s16le";
pub const CANONICAL_SAMPLE_RATE: u32 = 44_100;
pub const CANONICAL_CHANNEL_LAYOUT: &str = "stereo";

/// H.264 + AAC settings. Every segment of one job must share them so the
/// concat demuxer can join segments without re-encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    /// Constant Rate Factor, 0-51, lower is better
    pub crf: u8,
    pub pixel_format: String,
    /// Add `-tune stillimage`; segments are single held frames
    pub tune_still_image: bool,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "fast".to_string(),
            crf: 20,
            pixel_format: "yuv420p".to_string(),
            tune_still_image: true,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl EncodingConfig {
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// FFmpeg arguments for the video stream.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
        ];
        // Ken Burns segments still use it; the zoom is slow enough.
        if self.tune_still_image && self.codec == "libx264" {
            args.push("-tune".to_string());
            args.push("stillimage".to_string());
        }
        args.push("-pix_fmt".to_string());
        args.push(self.pixel_format.clone());
        args
    }

    /// FFmpeg arguments for the audio stream of the final container.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}
