//! Agent configuration
//!
//! Loaded once at startup from a TOML file (`--config` flag, falling back
//! to `vigil.toml` under the user config directory). Any load or
//! validation failure is fatal: the agent must not start half-configured.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "vigil.toml";

/// Default config directory name
const CONFIG_DIR_NAME: &str = "vigil";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error occurred while reading the config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Main configuration structure
///
/// All intervals are in seconds in the file; accessors convert to
/// `Duration` so callers never multiply units themselves.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Static credential attached to every server call.
    ///
    /// May be empty: reporting cycles are then skipped, but the close
    /// protocol still requires the server.
    #[serde(default)]
    pub api_key: String,

    /// Base endpoint of the remote authority
    #[serde(default)]
    pub api_url: String,

    /// Seconds between status reports
    #[serde(default = "default_activity_interval")]
    pub activity_interval: u64,

    /// Seconds between screenshot captures
    #[serde(default = "default_screenshot_interval")]
    pub screenshot_interval: u64,

    /// Seconds of no input before the user counts as idle
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold: u64,

    /// JPEG quality hint passed to the screen grabber (1-100)
    #[serde(default = "default_screenshot_quality")]
    pub screenshot_quality: u8,

    /// Seconds between close-approval polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_activity_interval() -> u64 {
    30
}

fn default_screenshot_interval() -> u64 {
    600
}

fn default_idle_threshold() -> u64 {
    300
}

fn default_screenshot_quality() -> u8 {
    60
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        // serde defaults and Default must agree; an empty table gives
        // exactly the documented defaults.
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location under the user config directory
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::InvalidValue("could not determine user config directory".to_string())
        })?;
        Ok(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_key.is_empty() && self.api_url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "api_url must be set when api_key is set".to_string(),
            ));
        }
        if self.activity_interval == 0 || self.screenshot_interval == 0 || self.poll_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "intervals must be at least one second".to_string(),
            ));
        }
        if self.screenshot_quality == 0 || self.screenshot_quality > 100 {
            return Err(ConfigError::InvalidValue(format!(
                "screenshot_quality must be 1-100, got {}",
                self.screenshot_quality
            )));
        }
        Ok(())
    }

    pub fn activity_interval(&self) -> Duration {
        Duration::from_secs(self.activity_interval)
    }

    pub fn screenshot_interval(&self) -> Duration {
        Duration::from_secs(self.screenshot_interval)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}
