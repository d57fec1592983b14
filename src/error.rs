//! # Error Types
//!
//! Custom error types for Meter Link using `thiserror`.
//!
//! Frame decoding has its own error type ([`crate::frame::DecodeError`]) since
//! a rejected line is routine and never leaves the ingest loop.

use thiserror::Error;

/// Main error type for Meter Link
#[derive(Debug, Error)]
pub enum MeterLinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial radio device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Tracker state file could not be parsed or serialized
    #[error("State file error: {0}")]
    State(#[from] serde_json::Error),

    /// HTTP transport errors talking to the telemetry service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Telemetry service answered, but did not accept the reading
    #[error("Telemetry service rejected reading: {0}")]
    TelemetryRejected(String),
}

/// Result type alias for Meter Link
pub type Result<T> = std::result::Result<T, MeterLinkError>;
