//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod types;

pub use types::{DisplayConfig, LoggingConfig};

use crate::display::RelativePosition;

/// Application name used for the config directory
const APP_DIR: &str = "lamco-display-ctl";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Display management configuration
    #[serde(default)]
    pub display: DisplayConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Default config file location (`$XDG_CONFIG_HOME/lamco-display-ctl/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.display.xrandr_path.trim().is_empty() {
            anyhow::bail!("xrandr_path must not be empty");
        }

        if self.display.command_timeout_ms == 0 {
            anyhow::bail!("command_timeout_ms must be greater than zero");
        }

        if self.display.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }

        if self.display.revert_timeout_secs == 0 {
            anyhow::bail!("revert_timeout_secs must be greater than zero");
        }

        if !self.display.default_position.is_placeable() {
            anyhow::bail!(
                "Invalid default_position: {}",
                self.display.default_position
            );
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, xrandr_path: Option<String>, poll_interval_ms: Option<u64>) -> Self {
        if let Some(path) = xrandr_path {
            self.display.xrandr_path = path;
        }

        if let Some(interval) = poll_interval_ms {
            self.display.poll_interval_ms = interval;
        }

        self
    }

    /// Relation used when a secondary cannot be classified
    pub fn default_position(&self) -> RelativePosition {
        self.display.default_position
    }
}
