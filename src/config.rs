//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{MeterLinkError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path; empty means auto-detect
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Frame decoding configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FrameConfig {
    /// Source address of the power-meter node
    #[serde(default = "default_meter_node_id")]
    pub meter_node_id: u8,
}

/// Tracker state persistence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: String,
}

/// Telemetry service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// When false, readings are only logged
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_emoncms_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

/// Ingest loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Processed frames between status log messages
    #[serde(default = "default_status_interval_frames")]
    pub status_interval_frames: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files; empty logs to stdout only
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_baud_rate() -> u32 { 9600 }
fn default_reconnect_interval_ms() -> u64 { 5000 }

fn default_meter_node_id() -> u8 { 5 }

fn default_state_path() -> String { "last_packets".to_string() }

fn default_telemetry_enabled() -> bool { true }
fn default_emoncms_url() -> String { "http://emoncms.org".to_string() }
fn default_request_timeout_ms() -> u64 { 10000 }

fn default_status_interval_frames() -> u64 { 100 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { meter_node_id: default_meter_node_id() }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { path: default_state_path() }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            url: default_emoncms_url(),
            api_key: String::new(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { status_interval_frames: default_status_interval_frames() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use meter_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without validating it
    ///
    /// Lets callers apply overrides (e.g. from the command line) before
    /// calling [`Config::validate`].
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if ![1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200",
            ));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.state.path.is_empty() {
            return Err(invalid("state path cannot be empty"));
        }

        if self.telemetry.enabled {
            if !(self.telemetry.url.starts_with("http://") || self.telemetry.url.starts_with("https://")) {
                return Err(invalid("telemetry url must start with http:// or https://"));
            }

            if self.telemetry.api_key.is_empty() {
                return Err(invalid("telemetry api_key cannot be empty when enabled"));
            }
        }

        if self.telemetry.timeout_ms == 0 || self.telemetry.timeout_ms > 60000 {
            return Err(invalid("telemetry timeout_ms must be between 1 and 60000"));
        }

        if self.link.status_interval_frames == 0 {
            return Err(invalid("status_interval_frames must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> MeterLinkError {
    MeterLinkError::Config(toml::de::Error::custom(msg))
}
