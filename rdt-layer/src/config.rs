//! Per-session protocol constants.
//!
//! An [`RdtConfig`] is fixed once an [`crate::layer::RdtLayer`] is built;
//! none of the values are tunable mid-transfer.

use thiserror::Error;

/// Payload bytes per data segment in the default configuration.
pub const DEFAULT_PAYLOAD_SIZE: usize = 4;
/// Flow-control window in bytes in the default configuration.
pub const DEFAULT_WINDOW_SIZE: usize = 15;
/// Retransmit threshold in ticks in the default configuration.
pub const DEFAULT_TIMEOUT_TICKS: u64 = 4;

/// Protocol constants for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdtConfig {
    /// Maximum payload bytes per data segment.
    pub payload_size: usize,
    /// Receiver flow-control window in bytes.
    ///
    /// A new segment is emitted only while
    /// `next_seq + payload_size < window_base + window_size`.
    pub window_size: usize,
    /// A segment is retransmitted once `tick - sent_at > timeout_ticks`.
    pub timeout_ticks: u64,
}

impl Default for RdtConfig {
    fn default() -> Self {
        Self {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
        }
    }
}

impl RdtConfig {
    /// Check that the constants describe a session that can make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payload_size == 0 {
            return Err(ConfigError::ZeroPayloadSize);
        }
        if self.window_size <= self.payload_size {
            return Err(ConfigError::WindowTooSmall {
                window: self.window_size,
                payload: self.payload_size,
            });
        }
        if self.timeout_ticks == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Invalid [`RdtConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("payload size must be at least 1 byte")]
    ZeroPayloadSize,

    /// With `window <= payload` the window test never admits a segment.
    #[error("window of {window} bytes cannot hold a {payload}-byte segment")]
    WindowTooSmall { window: usize, payload: usize },

    #[error("retransmit timeout must be at least 1 tick")]
    ZeroTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = RdtConfig::default();
        assert_eq!(cfg.payload_size, 4);
        assert_eq!(cfg.window_size, 15);
        assert_eq!(cfg.timeout_ticks, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_payload_rejected() {
        let cfg = RdtConfig {
            payload_size: 0,
            ..RdtConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPayloadSize));
    }

    #[test]
    fn window_equal_to_payload_rejected() {
        let cfg = RdtConfig {
            payload_size: 8,
            window_size: 8,
            timeout_ticks: 4,
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::WindowTooSmall {
                window: 8,
                payload: 8
            })
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = RdtConfig {
            timeout_ticks: 0,
            ..RdtConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn error_messages() {
        let err = ConfigError::WindowTooSmall {
            window: 3,
            payload: 4,
        };
        assert_eq!(err.to_string(), "window of 3 bytes cannot hold a 4-byte segment");
    }
}
