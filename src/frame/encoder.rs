//! # Meter Frame Encoder
//!
//! Renders a [`Frame`] in the radio bridge's textual line format.

use super::protocol::Frame;

/// Encode a frame as 8 space-separated decimal byte values
///
/// # Examples
///
/// ```
/// use meter_link::frame::{encode_frame_line, Frame};
///
/// let frame = Frame { dst_node_id: 5, src_node_id: 5, power: 10, count: 7, tx_count: 1 };
/// assert_eq!(encode_frame_line(&frame), "5 5 10 0 7 0 1 0");
/// ```
pub fn encode_frame_line(frame: &Frame) -> String {
    frame
        .to_bytes()
        .iter()
        .map(|byte| byte.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_max_values() {
        let frame = Frame {
            dst_node_id: 255,
            src_node_id: 5,
            power: u16::MAX,
            count: 256,
            tx_count: 0,
        };
        assert_eq!(encode_frame_line(&frame), "255 5 255 255 0 1 0 0");
    }
}
