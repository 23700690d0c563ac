//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::display::RelativePosition;

/// Display management configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display-configuration utility (name on PATH or absolute path)
    pub xrandr_path: String,

    /// Upper bound for every utility invocation in milliseconds
    pub command_timeout_ms: u64,

    /// Hotplug poll period in milliseconds
    pub poll_interval_ms: u64,

    /// Orientation countdown before an unconfirmed rotation is reverted
    pub revert_timeout_secs: u32,

    /// Relation offered for a new secondary whose placement is unknown
    pub default_position: RelativePosition,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            xrandr_path: "xrandr".to_string(),
            command_timeout_ms: 5000,
            poll_interval_ms: 2000,
            revert_timeout_secs: 10,
            default_position: RelativePosition::RightOf,
        }
    }
}

impl DisplayConfig {
    /// Command timeout as a [`Duration`]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Hotplug poll period as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Directory for daily rolling log files (None = console only)
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}
