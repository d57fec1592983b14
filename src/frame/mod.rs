//! # Meter Frame Module
//!
//! Codec for the fixed 8-byte frame sent by the power-meter node.
//!
//! The radio bridge prints every received packet as a line of
//! space-separated decimal byte values. This module handles:
//! - Source filtering on the sender address (byte 1)
//! - Decoding the little-endian power and counter fields
//! - Encoding a frame back to its textual form

pub mod protocol;
pub mod encoder;
pub mod decoder;

pub use decoder::{decode_frame_line, DecodeError};
pub use encoder::encode_frame_line;
pub use protocol::Frame;
