//! Configuration for the plugin host

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HostResult;

/// Tuning for the health monitor loop. Both knobs may also be changed on a
/// running monitor through its setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay between liveness sweeps, in milliseconds.
    pub check_interval_ms: u64,
    /// Consecutive failures at which a module is classified CRITICAL.
    pub failure_threshold: u32,
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 10_000,
            failure_threshold: 3,
        }
    }
}

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub monitor: MonitorConfig,
    /// Directory the demo drivers look in for plugin artifacts. The core
    /// never scans it; paths handed to `load` are used as-is.
    pub plugin_dir: Option<PathBuf>,
}

impl HostConfig {
    pub fn from_toml_str(raw: &str) -> HostResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> HostResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.monitor.check_interval(), Duration::from_secs(10));
        assert_eq!(config.monitor.failure_threshold, 3);
        assert!(config.plugin_dir.is_none());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = HostConfig::from_toml_str(
            r#"
            [monitor]
            check_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.monitor.check_interval(), Duration::from_millis(250));
        assert_eq!(config.monitor.failure_threshold, 3);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = HostConfig::from_toml_str("monitor = 3");
        assert!(result.is_err());
    }
}
