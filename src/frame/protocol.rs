//! # Meter Frame Layout
//!
//! Byte offsets and the typed frame for the power-meter packet.
//!
//! ```text
//! byte  0      1      2..3        4..5        6..7
//!       dst    src    power (LE)  count (LE)  tx_count (LE)
//! ```

/// Minimum number of bytes in a meter frame
pub const FRAME_LEN: usize = 8;

/// Address of the power-meter node in the reference deployment
pub const DEFAULT_METER_NODE_ID: u8 = 5;

/// Destination node id offset
pub const DST_OFFSET: usize = 0;

/// Source node id offset
pub const SRC_OFFSET: usize = 1;

/// Power reading offset (u16, little-endian)
pub const POWER_OFFSET: usize = 2;

/// Reading counter offset (u16, little-endian)
pub const COUNT_OFFSET: usize = 4;

/// Transmission counter offset (u16, little-endian)
pub const TX_COUNT_OFFSET: usize = 6;

/// One decoded meter transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Destination node address
    pub dst_node_id: u8,

    /// Source node address
    pub src_node_id: u8,

    /// Instantaneous meter power value
    pub power: u16,

    /// Reading counter, advances only when the sensor takes a new measurement
    pub count: u16,

    /// Transmission counter, advances on every radio transmission
    pub tx_count: u16,
}

impl Frame {
    /// Build a frame from its raw bytes
    ///
    /// Bytes past [`FRAME_LEN`] are ignored.
    pub fn from_bytes(bytes: &[u8; FRAME_LEN]) -> Self {
        Self {
            dst_node_id: bytes[DST_OFFSET],
            src_node_id: bytes[SRC_OFFSET],
            power: u16::from_le_bytes([bytes[POWER_OFFSET], bytes[POWER_OFFSET + 1]]),
            count: u16::from_le_bytes([bytes[COUNT_OFFSET], bytes[COUNT_OFFSET + 1]]),
            tx_count: u16::from_le_bytes([bytes[TX_COUNT_OFFSET], bytes[TX_COUNT_OFFSET + 1]]),
        }
    }

    /// Serialize the frame into its raw bytes
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[DST_OFFSET] = self.dst_node_id;
        bytes[SRC_OFFSET] = self.src_node_id;
        bytes[POWER_OFFSET..POWER_OFFSET + 2].copy_from_slice(&self.power.to_le_bytes());
        bytes[COUNT_OFFSET..COUNT_OFFSET + 2].copy_from_slice(&self.count.to_le_bytes());
        bytes[TX_COUNT_OFFSET..TX_COUNT_OFFSET + 2].copy_from_slice(&self.tx_count.to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(FRAME_LEN, 8);
        assert_eq!(DEFAULT_METER_NODE_ID, 5);
        assert_eq!(TX_COUNT_OFFSET + 2, FRAME_LEN);
    }

    #[test]
    fn test_from_bytes_little_endian() {
        // power = 0x0102, count = 0x0304, tx_count = 0xFFFE
        let frame = Frame::from_bytes(&[1, 5, 0x02, 0x01, 0x04, 0x03, 0xFE, 0xFF]);
        assert_eq!(frame.dst_node_id, 1);
        assert_eq!(frame.src_node_id, 5);
        assert_eq!(frame.power, 258);
        assert_eq!(frame.count, 772);
        assert_eq!(frame.tx_count, 65534);
    }

    #[test]
    fn test_to_bytes_layout() {
        let frame = Frame {
            dst_node_id: 5,
            src_node_id: 5,
            power: 10,
            count: 7,
            tx_count: 1,
        };
        assert_eq!(frame.to_bytes(), [5, 5, 10, 0, 7, 0, 1, 0]);
    }
}
