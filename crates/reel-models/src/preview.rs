//! Generated-image previews awaiting human approval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Maximum prompt length accepted for generation.
pub const MAX_PROMPT_LEN: usize = 1000;

/// Opaque preview identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewId(pub String);

impl PreviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PreviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the generated image lives: exactly one of a local file or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewSource {
    LocalFile { path: PathBuf },
    ExternalUrl { url: String },
}

impl PreviewSource {
    /// Backing file, if any.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            PreviewSource::LocalFile { path } => Some(path),
            PreviewSource::ExternalUrl { .. } => None,
        }
    }

    /// String form handed to callers for display.
    pub fn locator(&self) -> String {
        match self {
            PreviewSource::LocalFile { path } => path.to_string_lossy().into_owned(),
            PreviewSource::ExternalUrl { url } => url.clone(),
        }
    }
}

/// A preview held in the cache until approved, rejected or expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewEntry {
    pub id: PreviewId,
    pub prompt: String,
    pub service_name: String,
    pub source: PreviewSource,
    pub created_at: DateTime<Utc>,
}

impl PreviewEntry {
    pub fn new(
        id: PreviewId,
        prompt: impl Into<String>,
        service_name: impl Into<String>,
        source: PreviewSource,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            service_name: service_name.into(),
            source,
            created_at: Utc::now(),
        }
    }
}

/// Parameters for generating a preview image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptParams {
    pub prompt: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_quality")]
    pub quality: String,
}

fn default_service() -> String {
    "stable_diffusion".to_string()
}
fn default_size() -> String {
    "1024x1024".to_string()
}
fn default_quality() -> String {
    "standard".to_string()
}

impl PromptParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            service: default_service(),
            size: default_size(),
            quality: default_quality(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Validate prompt length. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.prompt.trim().chars().count();
        if len == 0 {
            return Err("prompt must not be empty".to_string());
        }
        if self.prompt.chars().count() > MAX_PROMPT_LEN {
            return Err(format!("prompt exceeds {} characters", MAX_PROMPT_LEN));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_is_tagged() {
        let source = PreviewSource::ExternalUrl {
            url: "https://example.com/a.png".to_string(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "external_url");

        // A payload with neither variant cannot be represented.
        let missing: Result<PreviewSource, _> = serde_json::from_str(r#"{"type":"none"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_entry_roundtrips_through_json() {
        let entry = PreviewEntry::new(
            PreviewId::new(),
            "a lighthouse at dusk",
            "stable_diffusion",
            PreviewSource::LocalFile {
                path: PathBuf::from("uploads/sd_1.png"),
            },
        );
        let json = serde_json::to_string(&entry).unwrap();
        let back: PreviewEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.source.local_path(), Some(Path::new("uploads/sd_1.png")));
    }

    #[test]
    fn test_prompt_validation() {
        assert!(PromptParams::new("ocean").validate().is_ok());
        assert!(PromptParams::new("   ").validate().is_err());
        assert!(PromptParams::new("x".repeat(MAX_PROMPT_LEN + 1))
            .validate()
            .is_err());
    }
}
