//! Segment definitions.
//!
//! A [`Segment`] is the unit handed to and taken from a
//! [`crate::channel::Channel`].  It plays exactly one of two roles:
//!
//! - [`Segment::Ack`]: a cumulative acknowledgement carrying the receiver's
//!   next expected sequence number.
//! - [`Segment::Data`]: a [`DataSegment`] holding a sequence number, a
//!   non-empty slice of the sender's outbound data, and a checksum.
//!
//! Only data segments are checksummed.  The checksum covers the sequence
//! number and the payload, so a channel that flips payload bytes (or
//! rewrites the sequence number) produces a segment that fails
//! [`DataSegment::is_valid`].
//!
//! # Checksummed bytes
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Sequence Number (big-endian)                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// DataSegment
// ---------------------------------------------------------------------------

/// A data-bearing segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    /// Byte offset of the first payload byte within the sender's stream.
    pub seq: u32,
    /// Payload bytes.  Never empty for segments built by the engine.
    pub payload: Vec<u8>,
    /// Internet checksum (RFC 1071) over `seq` and `payload`.
    ///
    /// Computed by [`DataSegment::new`]; left untouched by channels that
    /// corrupt the payload, which is what makes corruption detectable.
    pub checksum: u16,
}

impl DataSegment {
    /// Build a data segment and compute its checksum.
    pub fn new(seq: u32, payload: Vec<u8>) -> Self {
        debug_assert!(!payload.is_empty(), "data segment with empty payload");
        let checksum = segment_checksum(seq, &payload);
        Self {
            seq,
            payload,
            checksum,
        }
    }

    /// Number of payload bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// `true` when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// First sequence number **after** this segment's payload.
    pub fn end(&self) -> u32 {
        self.seq.wrapping_add(self.payload.len() as u32)
    }

    /// Recompute the checksum and compare it with the stored one.
    pub fn is_valid(&self) -> bool {
        segment_checksum(self.seq, &self.payload) == self.checksum
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One unit exchanged over a channel: either an acknowledgement or data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Cumulative acknowledgement: every byte before `ack` has been received
    /// in order.
    Ack { ack: u32 },
    /// A data fragment.
    Data(DataSegment),
}

impl Segment {
    /// Build an acknowledgement segment.
    pub fn ack(ack: u32) -> Self {
        Segment::Ack { ack }
    }

    /// Build a checksummed data segment.
    pub fn data(seq: u32, payload: impl Into<Vec<u8>>) -> Self {
        Segment::Data(DataSegment::new(seq, payload.into()))
    }

    /// `true` for [`Segment::Ack`].
    pub fn is_ack(&self) -> bool {
        matches!(self, Segment::Ack { .. })
    }

    /// Checksum predicate.  Acknowledgements carry no checksum and always
    /// pass.
    pub fn checksum_ok(&self) -> bool {
        match self {
            Segment::Ack { .. } => true,
            Segment::Data(d) => d.is_valid(),
        }
    }
}

impl From<DataSegment> for Segment {
    fn from(d: DataSegment) -> Self {
        Segment::Data(d)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Ack { ack } => write!(f, "ACK ack={ack}"),
            Segment::Data(d) => write!(
                f,
                "DATA seq={} len={} csum={:#06x} payload={:?}",
                d.seq,
                d.payload.len(),
                d.checksum,
                String::from_utf8_lossy(&d.payload)
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Checksum of a data segment: RFC 1071 over the big-endian sequence number
/// followed by the payload.
pub fn segment_checksum(seq: u32, payload: &[u8]) -> u16 {
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(payload);
    internet_checksum(&buf)
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// Sum consecutive 16-bit big-endian words, fold the carry, return the
/// one's-complement.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);

    for word in &mut chunks {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    // Odd trailing byte, padded with a zero byte on the right.
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
