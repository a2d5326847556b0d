//! The reliable-data-transfer engine.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │  configure_outbound_data(data) / delivered_data()
//!      ▼
//!  RdtLayer ── tick(outbound, inbound) ──────────────────────────┐
//!    ├── SendWindow    (segmentation, window, retransmission)    │
//!    ├── ReceiveBuffer (checksum gate, reorder, delivery)        │
//!    └── RdtStats      (diagnostic counters)                     │
//!                                                                ▼
//!                                              Channel (outbound / inbound)
//! ```
//!
//! Every call to [`RdtLayer::tick`] advances the tick counter and then runs
//! two phases in a fixed order:
//!
//! 1. **Send**: resend timed-out segments, then emit new segments while
//!    the window has room.
//! 2. **Receive**: drain the inbound channel, apply ACKs and data, and send
//!    at most one cumulative ACK.
//!
//! Segments sent in phase 1 cannot be acknowledged in the same tick's
//! phase 2.  Nothing in a tick can fail: loss, corruption, reordering and
//! duplication are all absorbed into protocol state.

use std::borrow::Cow;

use thiserror::Error;

use crate::channel::Channel;
use crate::config::{ConfigError, RdtConfig};
use crate::receiver::{Disposition, ReceiveBuffer};
use crate::sender::{InFlight, SendWindow};
use crate::segment::Segment;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from setting up a transfer.  Ticking itself never fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayerError {
    /// Outbound data can only be set before the first tick.
    #[error("outbound data must be configured before the first tick (now at tick {tick})")]
    AlreadyStarted { tick: u64 },

    /// Sequence numbers are 32-bit byte offsets.
    #[error("outbound data of {len} bytes exceeds the 32-bit sequence space")]
    DataTooLarge { len: usize },
}

// ---------------------------------------------------------------------------
// RdtStats
// ---------------------------------------------------------------------------

/// Snapshot of an engine's diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RdtStats {
    /// Current tick.
    pub tick: u64,
    /// Data segments sent for the first time.
    pub segments_sent: u64,
    /// Timeout-driven retransmissions.
    pub retransmissions: u64,
    /// ACK segments sent.
    pub acks_sent: u64,
    /// ACK segments received.
    pub acks_received: u64,
    /// Inbound data segments rejected by checksum.
    pub checksum_failures: u64,
    /// Inbound data segments already delivered or already buffered.
    pub duplicates: u64,
    /// Payload bytes sent and not yet acknowledged.
    pub bytes_in_flight: usize,
    /// Segments waiting in the reorder buffer.
    pub buffered_segments: usize,
    /// Bytes delivered to the application.
    pub bytes_delivered: usize,
}

// ---------------------------------------------------------------------------
// RdtLayer
// ---------------------------------------------------------------------------

/// One endpoint of a reliable transfer.
///
/// Each instance owns all of its state; build a fresh one per session.
#[derive(Debug)]
pub struct RdtLayer {
    config: RdtConfig,

    /// Data to transfer.  Fixed before the first tick.
    outbound: Vec<u8>,

    /// Outbound window state.
    sender: SendWindow,

    /// Inbound reassembly state.
    receiver: ReceiveBuffer,

    /// Ticks elapsed; 0 until the first call to [`tick`](Self::tick).
    tick: u64,

    segments_sent: u64,
    acks_sent: u64,
    acks_received: u64,
    checksum_failures: u64,
    duplicates: u64,
}

impl Default for RdtLayer {
    fn default() -> Self {
        Self::with_valid_config(RdtConfig::default())
    }
}

impl RdtLayer {
    /// Build an engine after validating `config`.
    pub fn new(config: RdtConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: RdtConfig) -> Self {
        Self {
            config,
            outbound: Vec::new(),
            sender: SendWindow::new(&config),
            receiver: ReceiveBuffer::new(),
            tick: 0,
            segments_sent: 0,
            acks_sent: 0,
            acks_received: 0,
            checksum_failures: 0,
            duplicates: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Application boundary
    // -----------------------------------------------------------------------

    /// Set the data this endpoint transfers to its peer.
    ///
    /// Must be called before the first tick.  Calling it again before then
    /// replaces the data.
    pub fn configure_outbound_data(&mut self, data: impl Into<Vec<u8>>) -> Result<(), LayerError> {
        if self.tick > 0 {
            return Err(LayerError::AlreadyStarted { tick: self.tick });
        }
        let data = data.into();
        if data.len() > u32::MAX as usize {
            return Err(LayerError::DataTooLarge { len: data.len() });
        }
        self.outbound = data;
        Ok(())
    }

    /// Bytes received from the peer so far, in order and without gaps.
    pub fn delivered_data(&self) -> &[u8] {
        self.receiver.delivered()
    }

    /// [`delivered_data`](Self::delivered_data) as text, replacing invalid
    /// UTF-8.
    pub fn delivered_string(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.receiver.delivered())
    }

    /// Advance the protocol by one tick: send phase, then receive phase.
    pub fn tick<O, I>(&mut self, outbound: &mut O, inbound: &mut I)
    where
        O: Channel + ?Sized,
        I: Channel + ?Sized,
    {
        self.tick += 1;
        self.advance_send(outbound);
        self.advance_receive_and_respond(outbound, inbound);
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Send phase at the current tick.
    ///
    /// Resends every segment older than the timeout, then emits new
    /// segments until the window is full or the data is exhausted.  The
    /// channel only ever receives copies.
    pub fn advance_send<O: Channel + ?Sized>(&mut self, outbound: &mut O) {
        let tick = self.tick;

        for segment in self.sender.collect_expired(tick) {
            outbound.send(segment.into());
        }

        for segment in self.sender.fill(&self.outbound, tick) {
            log::debug!(
                "[rdt] → DATA seq={} len={} in_flight={} tick={}",
                segment.seq,
                segment.len(),
                self.sender.in_flight(),
                tick
            );
            self.segments_sent += 1;
            outbound.send(segment.into());
        }
    }

    /// Receive phase.
    ///
    /// Drains `inbound` once, applies every segment in arrival order, and
    /// sends a single ACK carrying the next expected sequence number if any
    /// data segment called for one.
    pub fn advance_receive_and_respond<O, I>(&mut self, outbound: &mut O, inbound: &mut I)
    where
        O: Channel + ?Sized,
        I: Channel + ?Sized,
    {
        let mut owe_ack = false;

        for segment in inbound.receive() {
            match segment {
                Segment::Ack { ack } => {
                    self.acks_received += 1;
                    let retired = self.sender.on_ack(ack);
                    log::debug!(
                        "[rdt] ← ACK ack={} (retired {} seg) base={}",
                        ack,
                        retired,
                        self.sender.send_base
                    );
                }
                Segment::Data(data) => {
                    let seq = data.seq;
                    let disposition = self.receiver.on_segment(data);
                    match disposition {
                        Disposition::CorruptInOrder | Disposition::CorruptFuture => {
                            self.checksum_failures += 1;
                            log::warn!("[rdt] ← DATA seq={seq} failed checksum; dropped");
                        }
                        Disposition::Stale | Disposition::AlreadyBuffered => {
                            self.duplicates += 1;
                            log::debug!("[rdt] ← DATA seq={seq} duplicate ({disposition:?})");
                        }
                        Disposition::Buffered => {
                            log::debug!(
                                "[rdt] ← DATA seq={seq} buffered; expecting {}",
                                self.receiver.next_seq
                            );
                        }
                        Disposition::Delivered { bytes } => {
                            log::debug!(
                                "[rdt] ← DATA seq={seq} delivered {bytes} byte(s); next={}",
                                self.receiver.next_seq
                            );
                        }
                    }
                    owe_ack |= disposition.owes_ack();
                }
            }
        }

        if owe_ack {
            let ack = Segment::ack(self.receiver.ack_number());
            log::trace!("[rdt] → {ack}");
            self.acks_sent += 1;
            outbound.send(ack);
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Protocol constants this engine was built with.
    pub fn config(&self) -> &RdtConfig {
        &self.config
    }

    /// Ticks elapsed.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Retransmission events so far.
    pub fn timeout_count(&self) -> u64 {
        self.sender.timeouts()
    }

    /// Sequence number of the next byte not yet segmented.
    pub fn next_send_seq(&self) -> u32 {
        self.sender.next_seq
    }

    /// Highest cumulative ACK received from the peer.
    pub fn send_window_base(&self) -> u32 {
        self.sender.send_base
    }

    /// Next sequence number expected from the peer.
    pub fn next_recv_seq(&self) -> u32 {
        self.receiver.next_seq
    }

    /// Outstanding segments, oldest first.
    pub fn in_flight(&self) -> impl Iterator<Item = &InFlight> {
        self.sender.entries()
    }

    /// Number of outstanding segments.
    pub fn in_flight_len(&self) -> usize {
        self.sender.in_flight()
    }

    /// Number of segments in the reorder buffer.
    pub fn buffered_len(&self) -> usize {
        self.receiver.buffered()
    }

    /// `true` once every outbound byte has been sent and acknowledged.
    pub fn is_send_complete(&self) -> bool {
        self.sender.next_seq as usize == self.outbound.len() && self.sender.in_flight() == 0
    }

    /// Snapshot of the engine's counters.
    pub fn stats(&self) -> RdtStats {
        RdtStats {
            tick: self.tick,
            segments_sent: self.segments_sent,
            retransmissions: self.sender.timeouts(),
            acks_sent: self.acks_sent,
            acks_received: self.acks_received,
            checksum_failures: self.checksum_failures,
            duplicates: self.duplicates,
            bytes_in_flight: self.sender.bytes_in_flight(),
            buffered_segments: self.receiver.buffered(),
            bytes_delivered: self.receiver.delivered().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Pipe;
    use crate::segment::DataSegment;

    fn wide() -> RdtLayer {
        RdtLayer::new(RdtConfig {
            payload_size: 4,
            window_size: 64,
            timeout_ticks: 4,
        })
        .unwrap()
    }

    fn in_flight_seqs(layer: &RdtLayer) -> Vec<u32> {
        layer.in_flight().map(|e| e.segment.seq).collect()
    }

    fn acks(segments: &[Segment]) -> Vec<u32> {
        segments
            .iter()
            .filter_map(|s| match s {
                Segment::Ack { ack } => Some(*ack),
                Segment::Data(_) => None,
            })
            .collect()
    }

    fn corrupt(seq: u32, payload: &str) -> Segment {
        let mut d = DataSegment::new(seq, payload.as_bytes().to_vec());
        d.payload[0] ^= 0x55;
        Segment::Data(d)
    }

    #[test]
    fn fresh_engine_is_zeroed() {
        let layer = RdtLayer::default();
        assert_eq!(layer.current_tick(), 0);
        assert_eq!(layer.next_send_seq(), 0);
        assert_eq!(layer.send_window_base(), 0);
        assert_eq!(layer.next_recv_seq(), 0);
        assert_eq!(layer.timeout_count(), 0);
        assert!(layer.delivered_data().is_empty());
        assert!(layer.is_send_complete());
    }

    #[test]
    fn invalid_config_rejected() {
        let err = RdtLayer::new(RdtConfig {
            payload_size: 0,
            ..RdtConfig::default()
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::ZeroPayloadSize);
    }

    #[test]
    fn configure_after_first_tick_rejected() {
        let mut layer = RdtLayer::default();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());
        layer.configure_outbound_data("abc").unwrap();
        layer.tick(&mut out, &mut inb);
        assert_eq!(
            layer.configure_outbound_data("def"),
            Err(LayerError::AlreadyStarted { tick: 1 })
        );
    }

    #[test]
    fn first_tick_fills_window() {
        let mut layer = RdtLayer::default();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());
        layer.configure_outbound_data("The quick brown fox").unwrap();
        layer.tick(&mut out, &mut inb);

        assert_eq!(
            out.receive(),
            vec![
                Segment::data(0, "The "),
                Segment::data(4, "quic"),
                Segment::data(8, "k br"),
            ]
        );
        assert_eq!(layer.next_send_seq(), 12);
        assert_eq!(layer.stats().bytes_in_flight, 12);
    }

    #[test]
    fn cumulative_ack_retires_only_segments_below_ack() {
        let mut layer = wide();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());
        layer.configure_outbound_data("0123456789abcdef").unwrap();
        layer.tick(&mut out, &mut inb);
        assert_eq!(in_flight_seqs(&layer), vec![0, 4, 8, 12]);
        out.receive();

        // Ack 8 covers bytes 0..8; the segment starting at 8 stays.
        inb.send(Segment::ack(8));
        layer.advance_receive_and_respond(&mut out, &mut inb);
        assert_eq!(in_flight_seqs(&layer), vec![8, 12]);
        assert_eq!(layer.send_window_base(), 8);

        inb.send(Segment::ack(12));
        layer.advance_receive_and_respond(&mut out, &mut inb);
        assert_eq!(in_flight_seqs(&layer), vec![12]);
        assert_eq!(layer.send_window_base(), 12);

        // Receiving ACKs never triggers an ACK.
        assert!(out.is_empty());
    }

    #[test]
    fn out_of_order_reassembly_through_engine() {
        let mut layer = RdtLayer::default();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());

        inb.send(Segment::data(4, "WXYZ"));
        inb.send(Segment::data(0, "ABCD"));
        layer.tick(&mut out, &mut inb);

        assert_eq!(layer.delivered_data(), b"ABCDWXYZ");
        assert_eq!(layer.next_recv_seq(), 8);
        assert_eq!(acks(&out.receive()), vec![8]);
    }

    #[test]
    fn one_ack_per_tick_regardless_of_batch_size() {
        let mut layer = RdtLayer::default();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());

        inb.send(Segment::data(8, "ijkl"));
        inb.send(Segment::data(0, "abcd"));
        inb.send(Segment::data(0, "abcd"));
        inb.send(Segment::data(4, "efgh"));
        inb.send(Segment::data(20, "uvwx"));
        layer.tick(&mut out, &mut inb);

        assert_eq!(acks(&out.receive()), vec![12]);
        assert_eq!(layer.delivered_string(), "abcdefghijkl");
        assert_eq!(layer.stats().duplicates, 1);
        assert_eq!(layer.buffered_len(), 1);
    }

    #[test]
    fn corrupt_in_order_segment_is_not_acked() {
        let mut layer = RdtLayer::default();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());

        inb.send(corrupt(0, "abcd"));
        layer.tick(&mut out, &mut inb);

        assert!(out.receive().is_empty());
        assert_eq!(layer.next_recv_seq(), 0);
        assert!(layer.delivered_data().is_empty());
        assert_eq!(layer.buffered_len(), 0);
        assert_eq!(layer.stats().checksum_failures, 1);
    }

    #[test]
    fn corrupt_future_segment_is_acked() {
        let mut layer = RdtLayer::default();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());

        inb.send(corrupt(4, "efgh"));
        layer.tick(&mut out, &mut inb);

        assert_eq!(acks(&out.receive()), vec![0]);
        assert_eq!(layer.buffered_len(), 0);
    }

    #[test]
    fn ack_in_batch_does_not_cancel_owed_ack() {
        let mut layer = wide();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());
        layer.configure_outbound_data("ABCD").unwrap();
        layer.tick(&mut out, &mut inb);
        out.receive();

        inb.send(Segment::data(0, "wxyz"));
        inb.send(Segment::ack(4));
        layer.tick(&mut out, &mut inb);

        assert_eq!(acks(&out.receive()), vec![4]);
        assert!(layer.is_send_complete());
    }

    #[test]
    fn timeout_resends_identical_segment_once() {
        let mut layer = RdtLayer::default();
        let (mut out, mut inb) = (Pipe::new(), Pipe::new());
        layer.configure_outbound_data("ABCD").unwrap();

        let mut sends = Vec::new();
        for _ in 1..=6 {
            layer.tick(&mut out, &mut inb);
            sends.push(out.receive());
        }

        assert_eq!(sends[0], vec![Segment::data(0, "ABCD")]);
        for quiet in &sends[1..5] {
            assert!(quiet.is_empty());
        }
        assert_eq!(sends[5], vec![Segment::data(0, "ABCD")]);
        assert_eq!(layer.timeout_count(), 1);
        assert_eq!(layer.stats().retransmissions, 1);
        assert_eq!(layer.stats().segments_sent, 1);
    }

    #[test]
    fn same_tick_sends_cannot_be_acked_in_that_tick() {
        let mut a = RdtLayer::default();
        let mut b = RdtLayer::default();
        let (mut a_to_b, mut b_to_a) = (Pipe::new(), Pipe::new());
        a.configure_outbound_data("ABCDEFGH").unwrap();

        a.tick(&mut a_to_b, &mut b_to_a);
        assert_eq!(a.in_flight_len(), 2);
        b.tick(&mut b_to_a, &mut a_to_b);
        assert_eq!(b.delivered_data(), b"ABCDEFGH");

        // The ACK reaches A on its next tick.
        a.tick(&mut a_to_b, &mut b_to_a);
        assert!(a.is_send_complete());
        assert_eq!(a.send_window_base(), 8);
    }
}
