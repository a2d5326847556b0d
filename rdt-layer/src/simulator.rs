//! Fault-injecting channel for deterministic testing.
//!
//! Real links drop, delay, reorder, duplicate and corrupt segments.  To
//! exercise the reliability mechanisms reproducibly, [`UnreliableChannel`]
//! applies a configurable fault model driven by a seeded RNG:
//!
//! | Fault       | Applied in  | Description                                      |
//! |-------------|-------------|--------------------------------------------------|
//! | Loss        | `send`      | Drop the segment with probability `loss_rate`.   |
//! | Corruption  | `send`      | Flip one payload byte of a data segment.  The    |
//! |             |             | checksum is left alone, so the receiver notices. |
//! | Duplication | `send`      | Deliver the segment twice.                       |
//! | Delay       | `send`      | Hold a copy back for `1..=max_delay` extra ticks.|
//! | Reordering  | `advance`   | Shuffle the segments that become ready together. |
//!
//! Time moves only when the driver calls [`UnreliableChannel::advance`],
//! once per tick.  A segment sent without delay becomes receivable after
//! the next `advance`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::channel::Channel;
use crate::segment::Segment;

/// Fault-model parameters.
///
/// All rates are probabilities in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Probability that a segment is silently dropped.
    pub loss_rate: f64,
    /// Probability that a data segment has one payload byte flipped.
    pub corrupt_rate: f64,
    /// Probability that a segment is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that a copy is held back for extra ticks.
    pub delay_rate: f64,
    /// Upper bound on the extra ticks of a delayed copy.
    pub max_delay: u64,
    /// Probability that the segments becoming ready in one tick are shuffled.
    pub reorder_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults: a one-tick-latency pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            delay_rate: 0.0,
            max_delay: 0,
            reorder_rate: 0.0,
        }
    }
}

impl SimulatorConfig {
    /// Check that every rate is a probability.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        let rates = [
            ("loss_rate", self.loss_rate),
            ("corrupt_rate", self.corrupt_rate),
            ("duplicate_rate", self.duplicate_rate),
            ("delay_rate", self.delay_rate),
            ("reorder_rate", self.reorder_rate),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulatorError::InvalidRate { name, value });
            }
        }
        Ok(())
    }
}

/// Invalid [`SimulatorConfig`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulatorError {
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
}

/// Counters kept by an [`UnreliableChannel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Segments handed to `send`.
    pub sent: u64,
    /// Segments dropped.
    pub dropped: u64,
    /// Data segments corrupted.
    pub corrupted: u64,
    /// Segments duplicated.
    pub duplicated: u64,
    /// Copies held back for extra ticks.
    pub delayed: u64,
    /// Segments returned from `receive`.
    pub delivered: u64,
}

/// A seeded, fault-injecting [`Channel`].
#[derive(Debug)]
pub struct UnreliableChannel {
    config: SimulatorConfig,
    rng: StdRng,
    /// Channel-local tick, advanced by [`advance`](Self::advance).
    clock: u64,
    /// Copies not yet deliverable, tagged with the tick they become ready.
    in_transit: Vec<(u64, Segment)>,
    /// Copies the next `receive` returns.
    ready: Vec<Segment>,
    stats: ChannelStats,
}

impl UnreliableChannel {
    /// Build a channel with the given fault model and RNG seed.
    pub fn new(config: SimulatorConfig, seed: u64) -> Result<Self, SimulatorError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            clock: 0,
            in_transit: Vec::new(),
            ready: Vec::new(),
            stats: ChannelStats::default(),
        })
    }

    /// A channel with no faults.
    pub fn reliable() -> Self {
        Self {
            config: SimulatorConfig::default(),
            rng: StdRng::seed_from_u64(0),
            clock: 0,
            in_transit: Vec::new(),
            ready: Vec::new(),
            stats: ChannelStats::default(),
        }
    }

    /// Move one tick forward: everything due becomes receivable.
    pub fn advance(&mut self) {
        let clock = self.clock;
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_transit)
            .into_iter()
            .partition(|(ready_at, _)| *ready_at <= clock);
        self.in_transit = later;
        self.ready.extend(due.into_iter().map(|(_, seg)| seg));

        if self.ready.len() > 1 && self.roll(self.config.reorder_rate) {
            self.ready.shuffle(&mut self.rng);
            log::trace!("[sim] reordered {} segment(s)", self.ready.len());
        }
        self.clock += 1;
    }

    /// Segments sent but not yet receivable or not yet received.
    pub fn in_transit(&self) -> usize {
        self.in_transit.len() + self.ready.len()
    }

    /// Fault and delivery counters so far.
    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// The fault model in use.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.gen_bool(rate)
    }

    fn corrupt(&mut self, segment: &mut Segment) -> bool {
        match segment {
            Segment::Data(d) if !d.payload.is_empty() => {
                let i = self.rng.gen_range(0..d.payload.len());
                d.payload[i] ^= self.rng.gen_range(1..=u8::MAX);
                true
            }
            _ => false,
        }
    }

    fn enqueue(&mut self, segment: Segment) {
        let mut ready_at = self.clock;
        if self.config.max_delay > 0 && self.roll(self.config.delay_rate) {
            ready_at += self.rng.gen_range(1..=self.config.max_delay);
            self.stats.delayed += 1;
        }
        self.in_transit.push((ready_at, segment));
    }
}

impl Channel for UnreliableChannel {
    fn send(&mut self, mut segment: Segment) {
        self.stats.sent += 1;

        if self.roll(self.config.loss_rate) {
            self.stats.dropped += 1;
            log::trace!("[sim] dropped {segment}");
            return;
        }

        if self.roll(self.config.corrupt_rate) && self.corrupt(&mut segment) {
            self.stats.corrupted += 1;
            log::trace!("[sim] corrupted {segment}");
        }

        if self.roll(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            self.enqueue(segment.clone());
        }
        self.enqueue(segment);
    }

    fn receive(&mut self) -> Vec<Segment> {
        let batch = std::mem::take(&mut self.ready);
        self.stats.delivered += batch.len() as u64;
        batch
    }
}
