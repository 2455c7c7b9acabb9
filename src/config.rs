//! ptrial configuration.
//!
//! Loaded from `~/.ptrial/config.toml`. Every key is optional; a missing
//! file means all defaults. Command-line flags override what is loaded.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{DataFormat, TimeFormat, TimePlacement};
use crate::observer::ObserverOptions;
use crate::runner::RunSettings;

/// ptrial configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Seconds between samples. Fractions are allowed.
    pub interval_secs: f64,

    /// Samples to take before stopping; `0` runs until interrupted.
    pub count: u64,

    /// Datapoints that may wait in the handoff queue before sampling blocks.
    pub queue_capacity: usize,

    pub time_format: TimeFormat,

    pub data_format: DataFormat,

    /// Put the timestamp under `"time"` instead of using it as the data key.
    pub time_as_value: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: 1.0,
            count: 0,
            queue_capacity: 64,
            time_format: TimeFormat::Integer,
            data_format: DataFormat::Json,
            time_as_value: false,
        }
    }
}

impl Config {
    /// Load config from `~/.ptrial/config.toml`, or defaults if it does not exist.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;

        config
            .validate()
            .map_err(|e| format!("{e} in {}", path.display()))?;

        Ok(config)
    }

    /// The config file path: `~/.ptrial/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".ptrial").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(format!(
                "interval-secs must be a positive number of seconds, got {}",
                self.interval_secs
            ));
        }
        if Duration::try_from_secs_f64(self.interval_secs).is_err() {
            return Err(format!("interval-secs {} is too large", self.interval_secs));
        }
        if self.queue_capacity == 0 {
            return Err("queue-capacity must be at least 1".to_string());
        }
        Ok(())
    }

    /// The sampling interval. Call [`Config::validate`] first.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(Duration::from_secs(1))
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            interval: self.interval(),
            count: self.count,
        }
    }

    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            time_format: self.time_format,
            data_format: self.data_format,
            placement: if self.time_as_value {
                TimePlacement::TimeAsValue
            } else {
                TimePlacement::TimeAsKey
            },
        }
    }
}
