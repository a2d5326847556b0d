//! The channel abstraction the engine sends through and receives from.
//!
//! A [`Channel`] is one direction of an unreliable link.  Two engines talk
//! over a pair of channels: A's outbound channel is B's inbound channel and
//! the other way round.
//!
//! ```text
//!   RdtLayer A ──send──▶ [ channel A→B ] ──receive──▶ RdtLayer B
//!   RdtLayer A ◀─receive── [ channel B→A ] ◀──send── RdtLayer B
//! ```
//!
//! Implementations:
//! - [`Pipe`]: lossless FIFO, for tests and as a baseline.
//! - [`crate::simulator::UnreliableChannel`]: seeded fault injection.

use std::collections::VecDeque;

use crate::segment::Segment;

/// One direction of a segment link.
///
/// `send` takes the segment by value, so channel-side mutation never reaches
/// the sender's retained copy.
pub trait Channel {
    /// Hand a segment to the channel.  Fire-and-forget.
    fn send(&mut self, segment: Segment);

    /// Take every segment currently available.  Never blocks; the result
    /// may be empty, out of order, duplicated, or corrupted.
    fn receive(&mut self) -> Vec<Segment>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn send(&mut self, segment: Segment) {
        (**self).send(segment)
    }

    fn receive(&mut self) -> Vec<Segment> {
        (**self).receive()
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, segment: Segment) {
        (**self).send(segment)
    }

    fn receive(&mut self) -> Vec<Segment> {
        (**self).receive()
    }
}

// ---------------------------------------------------------------------------
// Pipe
// ---------------------------------------------------------------------------

/// A lossless, order-preserving channel.
///
/// Everything sent is available to the next `receive`.
#[derive(Debug, Default)]
pub struct Pipe {
    queue: VecDeque<Segment>,
    sent: u64,
}

impl Pipe {
    /// An empty pipe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments staged for the next `receive`, without draining them.
    pub fn pending(&self) -> impl Iterator<Item = &Segment> {
        self.queue.iter()
    }

    /// Number of staged segments.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total segments ever sent through this pipe.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Channel for Pipe {
    fn send(&mut self, segment: Segment) {
        self.sent += 1;
        self.queue.push_back(segment);
    }

    fn receive(&mut self) -> Vec<Segment> {
        self.queue.drain(..).collect()
    }
}
