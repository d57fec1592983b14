//! # Meter Link
//!
//! Relay power-meter readings from a serial radio receiver to EmonCMS.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration, apply command line overrides
//!    - Set up logging with tracing subscriber
//!    - Seed the sequence tracker from the state file
//!
//! 2. **Main Loop**
//!    - Open the serial port (retrying every `reconnect_interval_ms`)
//!    - Decode each line, forward new readings, checkpoint tracker state
//!    - Reopen the port if it closes or fails
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C is honoured between lines, never mid-frame
//!    - Log totals and exit
//!
//! Expected output:
//! ```text
//! INFO meter_link: Meter Link v0.1.0 starting...
//! INFO meter_link::store: Loaded state for 1 node(s) from last_packets
//! INFO meter_link::serial: Successfully opened radio receiver at /dev/ttyAMA0
//! INFO meter_link: Listening for frames from node 5 on /dev/ttyAMA0
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meter_link::config::{Config, LoggingConfig};
use meter_link::link::{Link, StopReason};
use meter_link::serial::RadioSerial;
use meter_link::store::{JsonFileStore, StateStore};
use meter_link::telemetry::{EmonCmsSink, LogSink, TelemetrySink};
use meter_link::tracker::SequenceTracker;

/// Name of the rotated log files
const LOG_FILE_PREFIX: &str = "meter-link.log";

#[derive(Debug, Parser)]
#[command(name = "meter-link", version, about = "Relay power-meter readings from a serial radio link to EmonCMS")]
struct Args {
    /// Configuration file; built-in defaults are used if it does not exist
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Serial device, overrides the configured port
    #[arg(short, long)]
    port: Option<String>,

    /// Log new readings instead of posting them
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if self.dry_run {
            config.telemetry.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if args.config.exists() {
        Config::read(&args.config)?
    } else {
        Config::default()
    };
    args.apply_to(&mut config);
    config.validate()?;

    let _log_guard = init_logging(&config.logging);

    info!("Meter Link v{} starting...", env!("CARGO_PKG_VERSION"));
    if !args.config.exists() {
        warn!("Config file {} not found, using defaults", args.config.display());
    }

    if config.telemetry.enabled {
        let sink = EmonCmsSink::new(
            &config.telemetry.url,
            &config.telemetry.api_key,
            Duration::from_millis(config.telemetry.timeout_ms),
        )?;
        info!("Forwarding new readings to {}", config.telemetry.url);
        serve(&config, sink).await
    } else {
        info!("Telemetry disabled, new readings are only logged");
        serve(&config, LogSink).await
    }
}

/// Run the ingest loop until Ctrl+C
async fn serve<T: TelemetrySink>(config: &Config, sink: T) -> Result<()> {
    let store = JsonFileStore::new(&config.state.path);
    let state = match store.load() {
        Ok(state) => state,
        Err(e) => {
            error!("Ignoring unreadable state file {}: {}", store.path().display(), e);
            Default::default()
        }
    };

    let mut link = Link::new(SequenceTracker::with_state(state), sink, store)
        .with_meter_node_id(config.frame.meter_node_id)
        .with_status_interval(config.link.status_interval_frames);

    let reconnect = Duration::from_millis(config.serial.reconnect_interval_ms);

    // One listener for the whole session, so Ctrl+C is never missed between runs
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let opened = if config.serial.port.is_empty() {
            RadioSerial::open(config.serial.baud_rate)
        } else {
            RadioSerial::open_with_paths(&[config.serial.port.as_str()], config.serial.baud_rate)
        };

        match opened {
            Ok(mut serial) => {
                info!(
                    "Listening for frames from node {} on {}",
                    config.frame.meter_node_id,
                    serial.device_path()
                );
                info!("Press Ctrl+C to exit");

                match link.run(&mut serial, &mut shutdown).await {
                    StopReason::Shutdown => break,
                    StopReason::Exhausted => warn!("Serial port {} closed", serial.device_path()),
                    StopReason::ReadError(e) => {
                        warn!("Serial read failed on {}: {}", serial.device_path(), e)
                    }
                }
            }
            Err(e) => warn!("{}", e),
        }

        info!("Reconnecting in {} ms", reconnect.as_millis());
        tokio::select! {
            _ = sleep(reconnect) => {}
            _ = &mut shutdown => break,
        }
    }

    let stats = link.stats();
    info!("Received Ctrl+C, shutting down...");
    info!(
        "Total: {} frames, {} forwarded, {} duplicate, {} reboot(s), {} gap(s)",
        stats.frames, stats.forwarded, stats.duplicates, stats.reboots, stats.gaps
    );

    Ok(())
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Initialize logging to stdout and, if configured, to daily-rotated files
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must be held for the lifetime of the program to flush the file writer.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if config.file_dir.is_empty() {
        registry.init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.file_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Some(guard)
}
