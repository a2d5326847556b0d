//! `rdt-layer`: an in-order, duplicate-free byte stream over a channel that
//! may drop, reorder, duplicate or corrupt segments.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐     DATA segments     ┌──────────────┐
//!  │  RdtLayer A  │──────────────────────▶│  RdtLayer B  │
//!  │  SendWindow  │                       │ ReceiveBuffer│
//!  └──────▲───────┘                       └──────┬───────┘
//!         │          cumulative ACKs             │
//!         └──────────────────────────────────────┘
//!                 (each arrow is a Channel)
//! ```
//!
//! Time is a tick counter.  The driver calls [`RdtLayer::tick`] on each
//! endpoint once per tick; there are no threads, timers or blocking calls.
//!
//! Each module has a single responsibility:
//! - [`segment`]: the ACK / DATA segment type and its checksum
//! - [`config`]: per-session protocol constants
//! - [`sender`]: send window, segmentation, timeout retransmission
//! - [`receiver`]: checksum gate, reorder buffer, in-order delivery
//! - [`layer`]: the per-tick engine tying both halves to channels
//! - [`channel`]: the channel trait and a lossless pipe
//! - [`simulator`]: seeded fault-injecting channel for testing
//!
//! # Example
//!
//! ```
//! use rdt_layer::{Pipe, RdtLayer};
//!
//! let mut client = RdtLayer::default();
//! let mut server = RdtLayer::default();
//! let (mut c2s, mut s2c) = (Pipe::new(), Pipe::new());
//!
//! client.configure_outbound_data("hello, world").unwrap();
//! while server.delivered_data() != b"hello, world" {
//!     client.tick(&mut c2s, &mut s2c);
//!     server.tick(&mut s2c, &mut c2s);
//! }
//! assert_eq!(server.delivered_string(), "hello, world");
//! ```

pub mod channel;
pub mod config;
pub mod layer;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod simulator;

pub use channel::{Channel, Pipe};
pub use config::{ConfigError, RdtConfig};
pub use layer::{LayerError, RdtLayer, RdtStats};
pub use segment::{DataSegment, Segment};
pub use simulator::{ChannelStats, SimulatorConfig, SimulatorError, UnreliableChannel};
