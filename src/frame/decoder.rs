//! # Meter Frame Decoder
//!
//! Decodes a textual radio line into a [`Frame`].

use super::protocol::*;
use thiserror::Error;

/// Reasons a line does not yield a frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Byte 1 is missing or is not the recognized meter address
    #[error("frame from unrecognized source: {0:?}")]
    UnrecognizedSource(Option<u8>),

    /// Recognized source, but the frame is short or holds a bad token
    #[error("frame incomplete: {0}")]
    Incomplete(String),
}

/// Decode one line of space-separated decimal bytes
///
/// # Arguments
///
/// * `line` - Raw line from the radio bridge (e.g. `"5 5 10 0 7 0 1 0"`)
/// * `recognized_src` - The only source address whose frames are decoded
///
/// # Returns
///
/// * `Result<Frame, DecodeError>` - Decoded frame, or why it was rejected
///
/// # Errors
///
/// - [`DecodeError::UnrecognizedSource`] if byte 1 is absent or is another node.
///   Frames of other node types have no defined layout and are not inspected further.
/// - [`DecodeError::Incomplete`] if fewer than 8 tokens are present or any of
///   the first 8 is not a decimal value in `0..=255`
///
/// # Examples
///
/// ```
/// use meter_link::frame::decode_frame_line;
///
/// let frame = decode_frame_line("5 5 10 0 7 0 1 0", 5).unwrap();
/// assert_eq!(frame.power, 10);
/// assert_eq!(frame.count, 7);
/// assert_eq!(frame.tx_count, 1);
/// ```
pub fn decode_frame_line(line: &str, recognized_src: u8) -> Result<Frame, DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let src = tokens.get(SRC_OFFSET).and_then(|token| token.parse::<u8>().ok());
    if src != Some(recognized_src) {
        return Err(DecodeError::UnrecognizedSource(src));
    }

    if tokens.len() < FRAME_LEN {
        return Err(DecodeError::Incomplete(format!(
            "expected {} bytes, got {}",
            FRAME_LEN,
            tokens.len()
        )));
    }

    let mut bytes = [0u8; FRAME_LEN];
    for (index, (slot, token)) in bytes.iter_mut().zip(&tokens).enumerate() {
        *slot = token.parse::<u8>().map_err(|_| {
            DecodeError::Incomplete(format!("byte {} is not a value in 0..=255: {:?}", index, token))
        })?;
    }

    Ok(Frame::from_bytes(&bytes))
}
