//! # Telemetry Module
//!
//! Forwards new meter readings to the telemetry service.
//!
//! This module handles:
//! - The [`TelemetrySink`] seam used by the ingest loop
//! - Posting readings to an EmonCMS input API
//! - A log-only sink for dry runs

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{MeterLinkError, Result};

/// Path of the EmonCMS input endpoint, relative to the base URL
const EMONCMS_INPUT_PATH: &str = "/input/post.json";

/// Body EmonCMS answers with when an input was accepted
const EMONCMS_ACCEPTED: &str = "ok";

/// One new reading destined for the telemetry service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Source node the reading came from
    pub node_id: u8,

    /// Meter power value
    pub power: u16,

    /// Reading counter of the node
    pub count: u16,
}

/// Receiver of new readings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySink: Send {
    /// Deliver one reading; called at most once per new reading
    async fn forward(&mut self, reading: &Reading) -> Result<()>;
}

/// Input fields sent to EmonCMS as the `json` query parameter
#[derive(Debug, Serialize)]
struct EmonCmsInput {
    power: u16,
    count: u16,
}

/// Sink posting readings to an EmonCMS input API
pub struct EmonCmsSink {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for EmonCmsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmonCmsSink")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl EmonCmsSink {
    /// Create a sink for the EmonCMS instance at `base_url`
    ///
    /// # Arguments
    ///
    /// * `base_url` - Instance root, e.g. `http://emoncms.org` (trailing `/` is ignored)
    /// * `api_key` - Write API key
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build the input request for one reading
    fn request(&self, reading: &Reading) -> Result<reqwest::Request> {
        let input = serde_json::to_string(&EmonCmsInput {
            power: reading.power,
            count: reading.count,
        })?;

        let request = self
            .client
            .get(format!("{}{}", self.base_url, EMONCMS_INPUT_PATH))
            .query(&[
                ("json", input),
                ("node", reading.node_id.to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .build()
            .map_err(reqwest::Error::without_url)?;

        Ok(request)
    }
}

#[async_trait]
impl TelemetrySink for EmonCmsSink {
    async fn forward(&mut self, reading: &Reading) -> Result<()> {
        let request = self.request(reading)?;
        debug!("Posting reading #{} to {}", reading.count, self.base_url);

        // The request URL carries the API key, keep it out of error messages
        let body = self
            .client
            .execute(request)
            .await
            .map_err(reqwest::Error::without_url)?
            .error_for_status()
            .map_err(reqwest::Error::without_url)?
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;

        let body = body.trim();
        if body != EMONCMS_ACCEPTED {
            return Err(MeterLinkError::TelemetryRejected(body.to_string()));
        }

        Ok(())
    }
}

/// Sink that only logs readings
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn forward(&mut self, reading: &Reading) -> Result<()> {
        info!(
            "[dry-run] node {} reading #{}: {} W",
            reading.node_id, reading.count, reading.power
        );
        Ok(())
    }
}
