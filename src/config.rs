//! Simulation configuration
//!
//! ```json
//! {
//!   "max_output_len": 40,
//!   "timing": { "tick_ms": 400, "fast_forward_start_ms": 100,
//!               "fast_forward_min_ms": 4, "fast_forward_ramp_ms": 5000 }
//! }
//! ```
//!
//! Every field is optional in JSON; missing fields take their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tick pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Normal tick duration
    pub tick_ms: u64,
    /// First tick duration after entering fast-forward
    pub fast_forward_start_ms: u64,
    /// Floor for fast-forward tick duration
    pub fast_forward_min_ms: u64,
    /// Time for fast-forward to ease down to the floor
    pub fast_forward_ramp_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 400,
            fast_forward_start_ms: 100,
            fast_forward_min_ms: 4,
            fast_forward_ramp_ms: 5000,
        }
    }
}

impl TimingConfig {
    /// Every tick is due immediately
    pub fn instant() -> Self {
        Self {
            tick_ms: 0,
            fast_forward_start_ms: 0,
            fast_forward_min_ms: 0,
            fast_forward_ramp_ms: 0,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn fast_forward_start(&self) -> Duration {
        Duration::from_millis(self.fast_forward_start_ms)
    }

    pub fn fast_forward_min(&self) -> Duration {
        Duration::from_millis(self.fast_forward_min_ms)
    }

    pub fn fast_forward_ramp(&self) -> Duration {
        Duration::from_millis(self.fast_forward_ramp_ms)
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Output values accepted per test set before `Output overflow`
    pub max_output_len: usize,
    pub timing: TimingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_output_len: 40,
            timing: TimingConfig::default(),
        }
    }
}

impl SimConfig {
    /// Batch runs: zero-length ticks
    pub fn headless() -> Self {
        Self {
            timing: TimingConfig::instant(),
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.max_output_len, 40);
        assert_eq!(config.timing.tick(), Duration::from_millis(400));
        assert_eq!(config.timing.fast_forward_min(), Duration::from_millis(4));
    }

    #[test]
    fn test_headless() {
        let config = SimConfig::headless();
        assert_eq!(config.timing.tick(), Duration::ZERO);
        assert_eq!(config.max_output_len, 40);
    }

    #[test]
    fn test_partial_json() {
        let config: SimConfig =
            serde_json::from_str(r#"{"timing": {"tick_ms": 50}}"#).unwrap();
        assert_eq!(config.max_output_len, 40);
        assert_eq!(config.timing.tick_ms, 50);
        assert_eq!(config.timing.fast_forward_ramp_ms, 5000);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_output_len": 12}}"#).unwrap();
        let config = SimConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_output_len, 12);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_from_json_file_errors() {
        assert!(SimConfig::from_json_file("/nonexistent/config.json").is_err());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = SimConfig::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
