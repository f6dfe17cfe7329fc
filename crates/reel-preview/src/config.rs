//! Preview cache configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default lifetime of an unapproved preview.
pub const DEFAULT_PREVIEW_TTL: Duration = Duration::from_secs(3600);

/// Default Redis key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "preview_image:";

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// How long a preview stays retrievable
    pub ttl: Duration,
    /// Key prefix for the Redis backend
    pub key_prefix: String,
    /// Redis URL; the in-memory store is used when unset
    pub redis_url: Option<String>,
    /// Where approved local files are moved
    pub durable_dir: PathBuf,
    /// How often the in-memory store drops expired entries
    pub sweep_interval: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_PREVIEW_TTL,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            redis_url: None,
            durable_dir: PathBuf::from("./uploads/approved"),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl PreviewConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: std::env::var("PREVIEW_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            key_prefix: std::env::var("PREVIEW_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
            durable_dir: std::env::var("PREVIEW_DURABLE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.durable_dir),
            sweep_interval: std::env::var("PREVIEW_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        }
    }
}
