//! # Serial Communication Module
//!
//! Handles the serial link to the radio receiver board.
//!
//! This module handles:
//! - Opening the serial port at 9600 baud, 8N1
//! - Auto-detecting the device among common paths
//! - Reading the receiver's output one text line per radio packet

pub mod port_trait;

pub use port_trait::{LineReader, LineSource};

use async_trait::async_trait;
use std::io;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{MeterLinkError, Result};

/// Baud rate of the radio receiver board
pub const RADIO_BAUD_RATE: u32 = 9600;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyAMA0", // On-board UART (Raspberry Pi receiver board)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Radio Serial Port Handler
///
/// Line source backed by the serial connection to the radio receiver.
pub struct RadioSerial {
    /// Buffered line reader over the serial port
    lines: LineReader<tokio_serial::SerialStream>,
    /// Device path (e.g., /dev/ttyAMA0)
    device_path: String,
}

impl std::fmt::Debug for RadioSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl RadioSerial {
    /// Open connection to the radio receiver
    ///
    /// Auto-detects the device by trying common paths.
    ///
    /// # Errors
    ///
    /// Returns error if no device could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use meter_link::serial::RadioSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = RadioSerial::open(9600)?;
    ///     Ok(())
    /// }
    /// ```
    pub fn open(baud_rate: u32) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate)
    }

    /// Open connection to the radio receiver with custom device paths
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyAMA0"])
    /// * `baud_rate` - Line speed of the receiver
    ///
    /// # Returns
    ///
    /// * `Result<RadioSerial>` - Connected serial port or error
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Successfully opened radio receiver at {}", path);
                    return Ok(Self {
                        lines: LineReader::new(port),
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(MeterLinkError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| MeterLinkError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl LineSource for RadioSerial {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}
