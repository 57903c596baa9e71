use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.alquran.cloud/v1";

/// What to do when an audio clip's duration cannot be probed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationPolicy {
    /// Substitute a fixed duration and mark the segment as `Fallback`.
    Fallback { seconds: f64 },
    /// Fail the resolution with `DurationUnresolved`.
    Fail,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self::Fallback { seconds: 5.0 }
    }
}

/// Settings shared by the caches, the timeline builder and the HTTP providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub duration_policy: DurationPolicy,
    /// Upper bound on audio resolutions in flight per `build_timeline`/`preload` call.
    pub max_concurrent_resolutions: usize,
    pub event_capacity: usize,
    pub api_base: String,
    /// Retries on HTTP 429 before giving up.
    pub max_retries: u32,
    /// Assumed constant bitrate when estimating duration from content length.
    pub audio_bitrate_kbps: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            duration_policy: DurationPolicy::default(),
            max_concurrent_resolutions: 8,
            event_capacity: 64,
            api_base: DEFAULT_API_BASE.to_string(),
            max_retries: 5,
            audio_bitrate_kbps: 128,
        }
    }
}

impl CoreConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_resolutions == 0 {
            bail!("max_concurrent_resolutions must be at least 1");
        }
        if self.event_capacity == 0 {
            bail!("event_capacity must be at least 1");
        }
        if self.audio_bitrate_kbps == 0 {
            bail!("audio_bitrate_kbps must be positive");
        }
        if let DurationPolicy::Fallback { seconds } = self.duration_policy {
            if !(seconds.is_finite() && seconds > 0.0) {
                bail!("fallback duration must be a positive number of seconds, got {seconds}");
            }
        }
        Ok(())
    }
}
