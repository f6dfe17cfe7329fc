//! Composition options supplied by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;

/// Default output resolution
pub const DEFAULT_RESOLUTION: Resolution = Resolution {
    width: 1920,
    height: 1080,
};
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_TRANSITION_SECS: f64 = 1.0;

/// Options validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("Invalid resolution '{0}', expected WIDTHxHEIGHT")]
    MalformedResolution(String),

    #[error("Resolution {width}x{height} must have non-zero, even dimensions")]
    UnsupportedResolution { width: u32, height: u32 },

    #[error("fps must be between 1 and 60, got {0}")]
    FpsOutOfRange(u32),

    #[error("Transition duration must be a finite, non-negative number of seconds, got {0}")]
    InvalidTransition(f64),
}

/// Output canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Create a resolution, rejecting sizes the H.264 encoder cannot take.
    pub fn new(width: u32, height: u32) -> Result<Self, OptionsError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(OptionsError::UnsupportedResolution { width, height });
        }
        Ok(Self { width, height })
    }
}

impl Default for Resolution {
    fn default() -> Self {
        DEFAULT_RESOLUTION
    }
}

impl FromStr for Resolution {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || OptionsError::MalformedResolution(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(malformed)?;
        let width = w.trim().parse::<u32>().map_err(|_| malformed())?;
        let height = h.trim().parse::<u32>().map_err(|_| malformed())?;
        Self::new(width, height)
    }
}

impl TryFrom<String> for Resolution {
    type Error = OptionsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How display time is distributed across images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageDistribution {
    /// Every image gets the same share of the total duration
    #[default]
    Equal,
}

/// Composition options record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionOptions {
    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_transition")]
    pub transition_duration_seconds: f64,

    #[serde(default)]
    pub ken_burns: bool,

    #[serde(default)]
    pub audio_visualization: bool,

    #[serde(default)]
    pub image_distribution: ImageDistribution,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_transition() -> f64 {
    DEFAULT_TRANSITION_SECS
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            fps: DEFAULT_FPS,
            transition_duration_seconds: DEFAULT_TRANSITION_SECS,
            ken_burns: false,
            audio_visualization: false,
            image_distribution: ImageDistribution::Equal,
        }
    }
}

impl CompositionOptions {
    /// Check value ranges that serde alone cannot express.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(MIN_FPS..=MAX_FPS).contains(&self.fps) {
            return Err(OptionsError::FpsOutOfRange(self.fps));
        }
        let t = self.transition_duration_seconds;
        if !t.is_finite() || t < 0.0 {
            return Err(OptionsError::InvalidTransition(t));
        }
        Ok(())
    }

    /// Whether any optional visual effect was requested.
    pub fn wants_effects(&self) -> bool {
        self.ken_burns || self.audio_visualization
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        let r: Resolution = "1280x720".parse().unwrap();
        assert_eq!((r.width, r.height), (1280, 720));
        assert_eq!(r.to_string(), "1280x720");
        assert!("1280".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
        assert!("0x720".parse::<Resolution>().is_err());
        assert!("1281x720".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_options_json_defaults() {
        let opts: CompositionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, CompositionOptions::default());

        let opts: CompositionOptions = serde_json::from_str(
            r#"{"resolution":"640x480","fps":24,"transitionDurationSeconds":0.5,"kenBurns":true,"imageDistribution":"equal"}"#,
        )
        .unwrap();
        assert_eq!(opts.resolution, Resolution::new(640, 480).unwrap());
        assert_eq!(opts.fps, 24);
        assert!(opts.ken_burns);
        assert!(!opts.audio_visualization);
    }

    #[test]
    fn test_bad_resolution_rejected_by_serde() {
        let result: Result<CompositionOptions, _> =
            serde_json::from_str(r#"{"resolution":"wide"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut opts = CompositionOptions::default();
        assert!(opts.validate().is_ok());

        opts.fps = 0;
        assert_eq!(opts.validate(), Err(OptionsError::FpsOutOfRange(0)));
        opts.fps = 61;
        assert!(opts.validate().is_err());

        opts.fps = 30;
        opts.transition_duration_seconds = -1.0;
        assert!(opts.validate().is_err());
        opts.transition_duration_seconds = f64::NAN;
        assert!(opts.validate().is_err());
        opts.transition_duration_seconds = 0.0;
        assert!(opts.validate().is_ok());
    }
}
