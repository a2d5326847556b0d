//! Send-side state: segmentation, flow-control window, retransmission.
//!
//! [`SendWindow`] owns the outstanding segments and the two sequence
//! counters of the sending half.  It never touches a channel;
//! [`crate::layer::RdtLayer`] hands the segments it returns to the channel.
//!
//! # Sequence-number layout
//!
//! ```text
//!  send_base          next_seq             send_base + window_size
//!      │                  │                          │
//!  ────┼──────────────────┼──────────────────────────┼──────▶ seq space
//!      │ <── in flight ──▶│ <──────── sendable ─────▶│
//! ```
//!
//! # Contract
//!
//! - A new segment is emitted only while
//!   `next_seq + payload_size < send_base + window_size`.  The test uses the
//!   configured payload size even for the short final fragment.
//! - ACKs are cumulative: `ack = K` retires every in-flight segment whose
//!   sequence number is below `K`.
//! - Every tick, every in-flight segment older than the timeout is resent
//!   unchanged and re-stamped.  There are no per-segment timers; a linear
//!   scan is the whole mechanism.

use std::collections::VecDeque;

use crate::config::RdtConfig;
use crate::segment::DataSegment;

// ---------------------------------------------------------------------------
// InFlight
// ---------------------------------------------------------------------------

/// A segment that has been sent and not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// The segment as first built.  Only clones of it reach the channel.
    pub segment: DataSegment,
    /// Total number of transmissions (1 = first send).
    pub tx_count: u32,
    /// Tick of the most recent transmission.
    pub sent_at: u64,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Send-side protocol state for one engine.
#[derive(Debug)]
pub struct SendWindow {
    /// Sequence number of the next byte not yet segmented.
    pub next_seq: u32,

    /// Highest cumulative ACK received; left edge of the usable window.
    pub send_base: u32,

    payload_size: usize,
    window_size: usize,
    timeout_ticks: u64,

    /// Outstanding segments in send order (front = oldest).
    in_flight: VecDeque<InFlight>,

    /// Retransmission events so far.
    timeouts: u64,
}

impl SendWindow {
    /// Create an empty window.  `config` is assumed validated.
    pub fn new(config: &RdtConfig) -> Self {
        Self {
            next_seq: 0,
            send_base: 0,
            payload_size: config.payload_size,
            window_size: config.window_size,
            timeout_ticks: config.timeout_ticks,
            in_flight: VecDeque::new(),
            timeouts: 0,
        }
    }

    /// `true` when the window admits one more full-size segment.
    pub fn has_room(&self) -> bool {
        let next_end = u64::from(self.next_seq) + self.payload_size as u64;
        let limit = u64::from(self.send_base) + self.window_size as u64;
        next_end < limit
    }

    /// Retransmission scan.
    ///
    /// Every in-flight segment whose age exceeds the timeout is re-stamped
    /// with `tick` and returned (as a copy) for resending.  Each one counts
    /// as one timeout.
    pub fn collect_expired(&mut self, tick: u64) -> Vec<DataSegment> {
        let mut expired = Vec::new();
        for entry in self.in_flight.iter_mut() {
            if tick.saturating_sub(entry.sent_at) > self.timeout_ticks {
                self.timeouts += 1;
                entry.sent_at = tick;
                entry.tx_count += 1;
                log::debug!(
                    "[rdt:send] timeout seq={} tx_count={} tick={}",
                    entry.segment.seq,
                    entry.tx_count,
                    tick
                );
                expired.push(entry.segment.clone());
            }
        }
        expired
    }

    /// Segment as much of `outbound` as the window allows.
    ///
    /// Each new segment is stamped with `tick`, recorded as in flight, and
    /// returned (as a copy) for sending.  Stops when the window is full or
    /// all of `outbound` has been segmented.
    pub fn fill(&mut self, outbound: &[u8], tick: u64) -> Vec<DataSegment> {
        let mut fresh = Vec::new();
        while self.has_room() {
            let start = self.next_seq as usize;
            if start >= outbound.len() {
                break;
            }
            let end = (start + self.payload_size).min(outbound.len());
            let segment = DataSegment::new(self.next_seq, outbound[start..end].to_vec());

            self.next_seq = segment.end();
            fresh.push(segment.clone());
            self.in_flight.push_back(InFlight {
                segment,
                tx_count: 1,
                sent_at: tick,
            });
        }
        fresh
    }

    /// Process a cumulative ACK.
    ///
    /// Retires every in-flight segment with `seq < ack`, moves `send_base`
    /// forward to `ack`, and returns the number of retired segments.  An
    /// ACK for data never sent is ignored; an ACK below `send_base` retires
    /// nothing and leaves the base where it is.
    pub fn on_ack(&mut self, ack: u32) -> usize {
        if ack > self.next_seq {
            log::warn!(
                "[rdt:send] ignoring ack={} beyond next_seq={}",
                ack,
                self.next_seq
            );
            return 0;
        }

        let before = self.in_flight.len();
        self.in_flight.retain(|e| e.segment.seq >= ack);
        self.send_base = self.send_base.max(ack);
        before - self.in_flight.len()
    }

    /// Iterate over outstanding segments, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &InFlight> {
        self.in_flight.iter()
    }

    /// Number of outstanding segments.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total payload bytes outstanding.
    pub fn bytes_in_flight(&self) -> usize {
        self.in_flight.iter().map(|e| e.segment.len()).sum()
    }

    /// Retransmission events so far.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }
}
