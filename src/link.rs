//! # Ingest Loop
//!
//! Ties the codec, the tracker and the collaborators together: every line
//! is decoded, classified, forwarded if it carries a new reading, and the
//! tracker state is checkpointed. One line is fully handled before the next
//! is read.

use std::future::Future;
use std::io;
use tracing::{debug, info, warn};

use crate::frame::{decode_frame_line, DecodeError};
use crate::frame::protocol::DEFAULT_METER_NODE_ID;
use crate::serial::LineSource;
use crate::store::StateStore;
use crate::telemetry::{Reading, TelemetrySink};
use crate::tracker::{Classification, ReadingOutcome, SequenceTracker, TransportEvent};

/// Default number of processed frames between status log messages
pub const DEFAULT_STATUS_INTERVAL_FRAMES: u64 = 100;

/// What happened to one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank line, nothing decoded
    Ignored,
    /// Line rejected by the decoder, tracker untouched
    Dropped(DecodeError),
    /// Frame evaluated by the tracker
    Processed(Classification),
}

/// Why [`Link::run`] returned
#[derive(Debug)]
pub enum StopReason {
    /// Shutdown was requested
    Shutdown,
    /// The line source has no more lines
    Exhausted,
    /// The line source failed
    ReadError(io::Error),
}

/// Running counters of the ingest loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Lines read from the source, blank ones included
    pub lines: u64,

    /// Lines decoded into frames and evaluated
    pub frames: u64,

    /// Lines rejected by the decoder
    pub dropped: u64,

    /// New readings accepted by the sink
    pub forwarded: u64,

    /// New readings the sink failed to deliver
    pub forward_failures: u64,

    /// Frames repeating the last reading
    pub duplicates: u64,

    /// Node restarts inferred from `tx_count`
    pub reboots: u64,

    /// Frames preceded by a `tx_count` jump
    pub gaps: u64,

    /// Total frames lost across all gaps
    pub missed_frames: u64,
}

/// Decode, classify, forward and persist
pub struct Link<T, P> {
    tracker: SequenceTracker,
    sink: T,
    store: P,
    meter_node_id: u8,
    status_interval_frames: u64,
    last_status_frames: u64,
    stats: LinkStats,
}

impl<T: TelemetrySink, P: StateStore> Link<T, P> {
    /// Create an ingest loop around a (typically seeded) tracker
    pub fn new(tracker: SequenceTracker, sink: T, store: P) -> Self {
        Self {
            tracker,
            sink,
            store,
            meter_node_id: DEFAULT_METER_NODE_ID,
            status_interval_frames: DEFAULT_STATUS_INTERVAL_FRAMES,
            last_status_frames: 0,
            stats: LinkStats::default(),
        }
    }

    /// Only decode frames sent by this node
    pub fn with_meter_node_id(mut self, node_id: u8) -> Self {
        self.meter_node_id = node_id;
        self
    }

    /// Log a status line every `frames` processed frames
    pub fn with_status_interval(mut self, frames: u64) -> Self {
        self.status_interval_frames = frames.max(1);
        self
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Handle one input line end to end
    ///
    /// Sink and store failures are logged and do not affect the outcome.
    pub async fn process_line(&mut self, line: &str) -> LineOutcome {
        self.stats.lines += 1;

        if line.trim().is_empty() {
            return LineOutcome::Ignored;
        }

        let frame = match decode_frame_line(line, self.meter_node_id) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.dropped += 1;
                match &e {
                    DecodeError::UnrecognizedSource(_) => debug!("Ignoring line {:?}: {}", line, e),
                    DecodeError::Incomplete(_) => warn!("Dropping line {:?}: {}", line, e),
                }
                return LineOutcome::Dropped(e);
            }
        };

        self.stats.frames += 1;
        let (classification, _) = self.tracker.evaluate(&frame);

        match classification.transport {
            Some(TransportEvent::Reboot) => {
                self.stats.reboots += 1;
                info!(
                    "Node {} rebooted (tx #{}), tracked state reset",
                    frame.src_node_id, frame.tx_count
                );
            }
            Some(TransportEvent::Gap { missed }) => {
                self.stats.gaps += 1;
                self.stats.missed_frames += u64::from(missed);
                warn!("Node {}: {} frame(s) missed before tx #{}", frame.src_node_id, missed, frame.tx_count);
            }
            None => {}
        }

        match classification.reading {
            ReadingOutcome::New => {
                debug!("New power value #{} ({} W)", frame.count, frame.power);
                let reading = Reading {
                    node_id: frame.src_node_id,
                    power: frame.power,
                    count: frame.count,
                };
                match self.sink.forward(&reading).await {
                    Ok(()) => self.stats.forwarded += 1,
                    Err(e) => {
                        self.stats.forward_failures += 1;
                        warn!("Failed to forward reading #{}: {}", reading.count, e);
                    }
                }
            }
            ReadingOutcome::Duplicate => {
                self.stats.duplicates += 1;
                debug!("Already logged value #{} ({} W)", frame.count, frame.power);
            }
        }

        if let Err(e) = self.store.save(self.tracker.state()) {
            warn!("Failed to persist tracker state: {}", e);
        }

        self.log_status();
        LineOutcome::Processed(classification)
    }

    /// Pull lines from `source` until it ends, fails, or `shutdown` resolves
    ///
    /// Shutdown is only observed while waiting for the next line, so a line
    /// that has been read is always processed completely.
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> StopReason
    where
        S: LineSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => return StopReason::Shutdown,
                next = source.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    self.process_line(&line).await;
                }
                Ok(None) => return StopReason::Exhausted,
                Err(e) => return StopReason::ReadError(e),
            }
        }
    }

    fn log_status(&mut self) {
        if self.stats.frames - self.last_status_frames >= self.status_interval_frames {
            info!(
                "Processed {} frames: {} forwarded, {} duplicate, {} reboot(s), {} gap(s) ({} missed), {} dropped line(s)",
                self.stats.frames,
                self.stats.forwarded,
                self.stats.duplicates,
                self.stats.reboots,
                self.stats.gaps,
                self.stats.missed_frames,
                self.stats.dropped
            );
            self.last_status_frames = self.stats.frames;
        }
    }
}
