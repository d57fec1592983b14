//! # Meter Link Library
//!
//! Relay power-meter readings received over a serial radio link to an
//! EmonCMS input API.
//!
//! This library provides the frame codec, the per-node sequence tracker that
//! filters duplicates and detects node restarts and lost frames, and the
//! ingest loop with its serial, persistence and telemetry collaborators.

pub mod config;
pub mod error;
pub mod frame;
pub mod link;
pub mod serial;
pub mod store;
pub mod telemetry;
pub mod tracker;
