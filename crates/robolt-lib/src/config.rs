//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::protocol::MAX_DUTY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Preferred device: USB serial or bus path (`usb:001/004`). Empty = first found.
    #[serde(default)]
    pub device: String,

    /// Motor speed used when none is given on the command line. Default: 100.
    #[serde(default = "default_duty")]
    pub default_speed: u8,

    /// Output PWM used when none is given on the command line. Default: 100.
    #[serde(default = "default_duty")]
    pub default_pwm: u8,

    /// Delay between status reads when watching inputs, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_duty() -> u8 {
    MAX_DUTY
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: String::new(),
            default_speed: default_duty(),
            default_pwm: default_duty(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Problems [`Config::validate`] can report.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `default_speed` is above 100.
    InvalidSpeed(u8),
    /// `default_pwm` is above 100.
    InvalidPwm(u8),
    /// `poll_interval_ms` is zero.
    ZeroPollInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSpeed(v) => write!(f, "default_speed must be 0-100, got {v}"),
            ConfigError::InvalidPwm(v) => write!(f, "default_pwm must be 0-100, got {v}"),
            ConfigError::ZeroPollInterval => write!(f, "poll_interval_ms must be at least 1"),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            dirs::config_dir().map(|p| p.join("RoboLT"))
        }
        #[cfg(not(windows))]
        {
            dirs::config_dir().map(|p| p.join("robolt"))
        }
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if self.default_speed > MAX_DUTY {
            errors.push(ConfigError::InvalidSpeed(self.default_speed));
        }
        if self.default_pwm > MAX_DUTY {
            errors.push(ConfigError::InvalidPwm(self.default_pwm));
        }
        if self.poll_interval_ms == 0 {
            errors.push(ConfigError::ZeroPollInterval);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
