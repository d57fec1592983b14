//! # Sequence Tracker
//!
//! Per-node classification of meter frames.
//!
//! Every frame carries two counters:
//! - `tx_count` advances on each radio transmission. A drop below the last
//!   seen value means the node restarted; a jump of more than one means
//!   frames were lost on the air.
//! - `count` advances only when the meter produces a new reading. The node
//!   repeats a reading several times, so an unchanged `count` is a duplicate.
//!
//! ## Known limitation
//!
//! The restart check compares raw counter values. A legitimate wrap of
//! `tx_count` from 65535 to 0 is indistinguishable from a restart and is
//! reported as [`TransportEvent::Reboot`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::frame::Frame;

/// Tracked counters for one source node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    /// `tx_count` of the most recently processed frame
    #[serde(rename = "tx_count", default, skip_serializing_if = "Option::is_none")]
    pub last_tx_count: Option<u16>,

    /// `count` of the most recently processed frame
    #[serde(rename = "count", default, skip_serializing_if = "Option::is_none")]
    pub last_count: Option<u16>,
}

/// Tracker state for all nodes, keyed by source node id
pub type TrackerState = BTreeMap<u8, NodeState>;

/// Reading-level outcome, decides whether the reading is forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOutcome {
    /// A reading not seen before for this node
    New,
    /// Same `count` as the previous frame
    Duplicate,
}

/// Transport-level observation, advisory only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// `tx_count` fell behind the last observed value; node state was reset
    Reboot,
    /// `tx_count` skipped ahead; `missed` frames never arrived
    Gap { missed: u16 },
}

/// Result of evaluating one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Whether the frame carries a reading not yet seen for this node
    pub reading: ReadingOutcome,

    /// Restart or lost frames inferred from `tx_count`, if any
    pub transport: Option<TransportEvent>,
}

impl Classification {
    /// True if the reading should be forwarded
    pub fn is_new(&self) -> bool {
        self.reading == ReadingOutcome::New
    }
}

/// Owns the `src_node_id -> NodeState` map
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    nodes: TrackerState,
}

impl SequenceTracker {
    /// Create a tracker with no prior knowledge of any node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker seeded from a persisted snapshot
    pub fn with_state(nodes: TrackerState) -> Self {
        Self { nodes }
    }

    /// Current state of every node, for checkpointing
    pub fn state(&self) -> &TrackerState {
        &self.nodes
    }

    /// Current state of one node
    pub fn node(&self, node_id: u8) -> Option<&NodeState> {
        self.nodes.get(&node_id)
    }

    /// Classify a frame and advance the counters of its source node
    ///
    /// # Returns
    ///
    /// * `(Classification, NodeState)` - Outcome and the node's updated state
    ///
    /// # Examples
    ///
    /// ```
    /// use meter_link::frame::Frame;
    /// use meter_link::tracker::{ReadingOutcome, SequenceTracker, TransportEvent};
    ///
    /// let mut tracker = SequenceTracker::new();
    /// let frame = Frame { dst_node_id: 5, src_node_id: 5, power: 10, count: 7, tx_count: 10 };
    /// let (first, _) = tracker.evaluate(&frame);
    /// assert_eq!(first.reading, ReadingOutcome::New);
    ///
    /// let (second, _) = tracker.evaluate(&Frame { tx_count: 13, ..frame });
    /// assert_eq!(second.reading, ReadingOutcome::Duplicate);
    /// assert_eq!(second.transport, Some(TransportEvent::Gap { missed: 2 }));
    /// ```
    pub fn evaluate(&mut self, frame: &Frame) -> (Classification, NodeState) {
        let state = self.nodes.entry(frame.src_node_id).or_default();

        let transport = state.last_tx_count.and_then(|last| {
            // Widened so that 65535 + 1 does not wrap back to 0
            let expected = u32::from(last) + 1;
            let received = u32::from(frame.tx_count);

            if expected > received {
                Some(TransportEvent::Reboot)
            } else if expected != received {
                Some(TransportEvent::Gap {
                    missed: (received - expected) as u16,
                })
            } else {
                None
            }
        });

        if transport == Some(TransportEvent::Reboot) {
            *state = NodeState::default();
        }

        state.last_tx_count = Some(frame.tx_count);

        let reading = if state.last_count != Some(frame.count) {
            state.last_count = Some(frame.count);
            ReadingOutcome::New
        } else {
            ReadingOutcome::Duplicate
        };

        (Classification { reading, transport }, *state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(count: u16, tx_count: u16) -> Frame {
        Frame {
            dst_node_id: 5,
            src_node_id: 5,
            power: 420,
            count,
            tx_count,
        }
    }

    fn seeded(last_tx_count: u16, last_count: u16) -> SequenceTracker {
        let mut nodes = TrackerState::new();
        nodes.insert(
            5,
            NodeState {
                last_tx_count: Some(last_tx_count),
                last_count: Some(last_count),
            },
        );
        SequenceTracker::with_state(nodes)
    }

    #[test]
    fn test_first_contact_is_new_without_transport_event() {
        let mut tracker = SequenceTracker::new();
        let (classification, state) = tracker.evaluate(&frame(7, 1));

        assert_eq!(classification.reading, ReadingOutcome::New);
        assert_eq!(classification.transport, None);
        assert_eq!(state.last_tx_count, Some(1));
        assert_eq!(state.last_count, Some(7));
    }

    #[test]
    fn test_first_contact_with_high_tx_count_is_not_a_gap() {
        let mut tracker = SequenceTracker::new();
        let (classification, _) = tracker.evaluate(&frame(7, 5000));
        assert_eq!(classification.transport, None);
    }

    #[test]
    fn test_repeated_reading_is_duplicate() {
        let mut tracker = SequenceTracker::new();
        let (first, _) = tracker.evaluate(&frame(7, 1));
        let (second, _) = tracker.evaluate(&frame(7, 2));

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(second.reading, ReadingOutcome::Duplicate);
    }

    #[test]
    fn test_identical_frame_replay_reports_reboot() {
        // A repeated tx_count is behind the expected next value
        let mut tracker = SequenceTracker::new();
        tracker.evaluate(&frame(7, 1));
        let (second, state) = tracker.evaluate(&frame(7, 1));

        assert_eq!(second.transport, Some(TransportEvent::Reboot));
        // Reset cleared last_count, so the reading counts as new
        assert_eq!(second.reading, ReadingOutcome::New);
        assert_eq!(state.last_count, Some(7));
    }

    #[test]
    fn test_retransmission_of_same_reading_is_duplicate() {
        let mut tracker = seeded(10, 7);
        let (classification, state) = tracker.evaluate(&frame(7, 11));

        assert_eq!(classification.reading, ReadingOutcome::Duplicate);
        assert_eq!(classification.transport, None);
        assert_eq!(state.last_tx_count, Some(11));
        assert_eq!(state.last_count, Some(7));
    }

    #[test]
    fn test_next_reading_in_sequence() {
        let mut tracker = seeded(10, 7);
        let (classification, state) = tracker.evaluate(&frame(8, 11));

        assert_eq!(classification.reading, ReadingOutcome::New);
        assert_eq!(classification.transport, None);
        assert_eq!(state.last_count, Some(8));
    }

    #[test]
    fn test_gap_detection() {
        let mut tracker = seeded(10, 7);
        let (classification, state) = tracker.evaluate(&frame(8, 13));

        assert_eq!(classification.transport, Some(TransportEvent::Gap { missed: 2 }));
        assert_eq!(classification.reading, ReadingOutcome::New);
        assert_eq!(state.last_tx_count, Some(13));
    }

    #[test]
    fn test_gap_with_duplicate_reading() {
        let mut tracker = seeded(10, 7);
        let (classification, _) = tracker.evaluate(&frame(7, 13));

        assert_eq!(classification.transport, Some(TransportEvent::Gap { missed: 2 }));
        assert_eq!(classification.reading, ReadingOutcome::Duplicate);
    }

    #[test]
    fn test_gap_up_to_counter_maximum() {
        let mut tracker = seeded(0, 7);
        let (classification, _) = tracker.evaluate(&frame(8, u16::MAX));
        assert_eq!(
            classification.transport,
            Some(TransportEvent::Gap { missed: u16::MAX - 1 })
        );
    }

    #[test]
    fn test_reboot_detection_clears_last_count() {
        let mut tracker = seeded(10, 7);
        let (classification, state) = tracker.evaluate(&frame(3, 2));

        assert_eq!(classification.transport, Some(TransportEvent::Reboot));
        assert_eq!(state.last_tx_count, Some(2));
        assert_eq!(state.last_count, Some(3));
    }

    #[test]
    fn test_reboot_makes_pre_reboot_count_new() {
        let mut tracker = seeded(10, 7);
        let (classification, _) = tracker.evaluate(&frame(7, 2));

        // Same count as before the restart, still forwarded
        assert_eq!(classification.transport, Some(TransportEvent::Reboot));
        assert_eq!(classification.reading, ReadingOutcome::New);

        let (next, _) = tracker.evaluate(&frame(7, 3));
        assert_eq!(next.transport, None);
        assert_eq!(next.reading, ReadingOutcome::Duplicate);
    }

    #[test]
    fn test_counter_wrap_is_reported_as_reboot() {
        // Known limitation: 65535 -> 0 looks exactly like a restart
        let mut tracker = seeded(65535, 7);
        let (classification, state) = tracker.evaluate(&frame(7, 0));

        assert_eq!(classification.transport, Some(TransportEvent::Reboot));
        assert_eq!(classification.reading, ReadingOutcome::New);
        assert_eq!(state.last_tx_count, Some(0));
    }

    #[test]
    fn test_reboot_only_resets_affected_node() {
        let mut tracker = seeded(10, 7);
        let other = Frame {
            src_node_id: 9,
            ..frame(40, 100)
        };
        tracker.evaluate(&other);

        tracker.evaluate(&frame(1, 0));

        let other_state = tracker.node(9).unwrap();
        assert_eq!(other_state.last_tx_count, Some(100));
        assert_eq!(other_state.last_count, Some(40));
    }

    #[test]
    fn test_nodes_tracked_independently() {
        let mut tracker = SequenceTracker::new();
        let (a, _) = tracker.evaluate(&frame(7, 1));
        let (b, _) = tracker.evaluate(&Frame {
            src_node_id: 6,
            ..frame(7, 1)
        });

        assert!(a.is_new());
        assert!(b.is_new());
        assert_eq!(b.transport, None);
        assert_eq!(tracker.state().len(), 2);
    }

    #[test]
    fn test_seeded_state_without_tx_count() {
        let mut nodes = TrackerState::new();
        nodes.insert(
            5,
            NodeState {
                last_tx_count: None,
                last_count: Some(7),
            },
        );
        let mut tracker = SequenceTracker::with_state(nodes);

        let (classification, _) = tracker.evaluate(&frame(7, 50));
        assert_eq!(classification.transport, None);
        assert_eq!(classification.reading, ReadingOutcome::Duplicate);
    }

    #[test]
    fn test_state_accessor_reflects_last_processed_frame() {
        let mut tracker = SequenceTracker::new();
        tracker.evaluate(&frame(7, 1));
        tracker.evaluate(&frame(7, 2));

        let state = tracker.state().get(&5).copied().unwrap();
        assert_eq!(state.last_tx_count, Some(2));
        assert_eq!(state.last_count, Some(7));
    }

    #[test]
    fn test_node_state_json_layout() {
        let mut nodes = TrackerState::new();
        nodes.insert(
            5,
            NodeState {
                last_tx_count: Some(12),
                last_count: Some(7),
            },
        );
        nodes.insert(6, NodeState::default());

        let json = serde_json::to_string(&nodes).unwrap();
        assert_eq!(json, r#"{"5":{"tx_count":12,"count":7},"6":{}}"#);

        let parsed: TrackerState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, nodes);
    }
}
