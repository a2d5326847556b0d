//! Receive-side state: checksum gate, reorder buffer, in-order delivery.
//!
//! [`ReceiveBuffer`] classifies each inbound data segment against
//! `next_seq` (the next byte expected in order):
//!
//! | Segment seq        | Checksum | Effect                              | ACK owed |
//! |--------------------|----------|-------------------------------------|----------|
//! | `== next_seq`      | ok       | deliver, then drain reorder buffer  | yes      |
//! | `== next_seq`      | bad      | drop                                | no       |
//! | `>  next_seq`      | ok       | buffer (unless already buffered)    | yes      |
//! | `>  next_seq`      | bad      | drop                                | yes      |
//! | `<  next_seq`      | any      | drop (already delivered)            | yes      |
//!
//! A bad checksum is acknowledged only for a future segment.  ACK segments
//! are not handled here; the caller routes them to
//! [`crate::sender::SendWindow::on_ack`].

use std::collections::BTreeMap;

use crate::segment::DataSegment;

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// What [`ReceiveBuffer::on_segment`] did with a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// In-order segment accepted; `bytes` counts everything delivered,
    /// including segments drained from the reorder buffer.
    Delivered { bytes: usize },
    /// Future segment stored in the reorder buffer.
    Buffered,
    /// Future segment whose sequence number is already buffered.
    AlreadyBuffered,
    /// Sequence number below `next_seq`: data already delivered.
    Stale,
    /// In-order segment that failed its checksum.
    CorruptInOrder,
    /// Future segment that failed its checksum.
    CorruptFuture,
}

impl Disposition {
    /// Whether this outcome obliges the receiver to send an ACK.
    pub fn owes_ack(self) -> bool {
        !matches!(self, Disposition::CorruptInOrder)
    }
}

// ---------------------------------------------------------------------------
// ReceiveBuffer
// ---------------------------------------------------------------------------

/// Receive-side protocol state for one engine.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    /// Next sequence number expected in order.  Also the ACK number.
    pub next_seq: u32,

    /// Bytes delivered so far, in order.  Append-only.
    delivered: Vec<u8>,

    /// Segments ahead of `next_seq`, keyed by sequence number.
    reorder: BTreeMap<u32, DataSegment>,
}

impl ReceiveBuffer {
    /// Create an empty buffer expecting sequence number 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one inbound data segment.
    pub fn on_segment(&mut self, segment: DataSegment) -> Disposition {
        if segment.seq == self.next_seq {
            if !segment.is_valid() {
                return Disposition::CorruptInOrder;
            }
            let before = self.delivered.len();
            self.deliver(segment);
            self.drain_reorder();
            Disposition::Delivered {
                bytes: self.delivered.len() - before,
            }
        } else if segment.seq > self.next_seq {
            if !segment.is_valid() {
                return Disposition::CorruptFuture;
            }
            if self.reorder.contains_key(&segment.seq) {
                return Disposition::AlreadyBuffered;
            }
            self.reorder.insert(segment.seq, segment);
            Disposition::Buffered
        } else {
            Disposition::Stale
        }
    }

    /// Cumulative ACK number to advertise: every byte before it is delivered.
    pub fn ack_number(&self) -> u32 {
        self.next_seq
    }

    /// Bytes delivered so far, in order.
    pub fn delivered(&self) -> &[u8] {
        &self.delivered
    }

    /// Number of segments waiting in the reorder buffer.
    pub fn buffered(&self) -> usize {
        self.reorder.len()
    }

    /// Sequence numbers currently held in the reorder buffer, ascending.
    pub fn buffered_seqs(&self) -> impl Iterator<Item = u32> + '_ {
        self.reorder.keys().copied()
    }

    fn deliver(&mut self, segment: DataSegment) {
        self.next_seq = segment.end();
        self.delivered.extend_from_slice(&segment.payload);
    }

    /// Deliver every buffered segment that is now contiguous.
    fn drain_reorder(&mut self) {
        while let Some(next) = self.reorder.remove(&self.next_seq) {
            log::trace!("[rdt:recv] draining buffered seq={}", next.seq);
            self.deliver(next);
        }
        // Anything left below next_seq can never be delivered.
        let next_seq = self.next_seq;
        self.reorder.retain(|&seq, _| seq > next_seq);
    }
}
