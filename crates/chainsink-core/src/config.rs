//! Sinker configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use chainsink_core::config::SinkerBuilder;
//!
//! let config = SinkerBuilder::new()
//!     .block_range("12287507:12300000")
//!     .flush_interval(500)
//!     .live_block_time_delta_secs(120)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.flush_interval, 500);
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;

/// Configuration of a sink instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkerConfig {
    /// Block range in `start[:end]` form; empty = from the module's initial block, unbounded.
    pub block_range: String,
    /// Undo buffer size forwarded to the block source (0 = source default).
    pub undo_buffer_size: usize,
    /// A block is live when produced at most this many seconds ago.
    pub live_block_time_delta_secs: i64,
    /// Flush every N blocks while not live; `<= 0` uses the default of 100.
    pub flush_interval: i64,
    /// Run upstream modules in development mode.
    pub development_mode: bool,
    /// Only consume irreversible blocks.
    pub irreversible_only: bool,
}

impl Default for SinkerConfig {
    fn default() -> Self {
        Self {
            block_range: String::new(),
            undo_buffer_size: 0,
            live_block_time_delta_secs: 300,
            flush_interval: 1000,
            development_mode: false,
            irreversible_only: false,
        }
    }
}

impl SinkerConfig {
    /// Liveness delta as a duration; fails when out of chrono's range.
    pub fn live_block_time_delta(&self) -> Result<Duration, SinkError> {
        Duration::try_seconds(self.live_block_time_delta_secs).ok_or_else(|| {
            SinkError::Config(format!(
                "live block time delta of {}s is out of range",
                self.live_block_time_delta_secs
            ))
        })
    }

    /// Reject values that cannot be turned into a running sink.
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.live_block_time_delta_secs < 0 {
            return Err(SinkError::Config(format!(
                "live block time delta must not be negative, got {}s",
                self.live_block_time_delta_secs
            )));
        }
        self.live_block_time_delta()?;
        Ok(())
    }
}

/// Fluent builder for [`SinkerConfig`].
#[derive(Default)]
pub struct SinkerBuilder {
    config: SinkerConfig,
}

impl SinkerBuilder {
    pub fn new() -> Self {
        Self {
            config: SinkerConfig::default(),
        }
    }

    /// Set the block range (`start[:end]`).
    pub fn block_range(mut self, range: impl Into<String>) -> Self {
        self.config.block_range = range.into();
        self
    }

    pub fn undo_buffer_size(mut self, size: usize) -> Self {
        self.config.undo_buffer_size = size;
        self
    }

    pub fn live_block_time_delta_secs(mut self, secs: i64) -> Self {
        self.config.live_block_time_delta_secs = secs;
        self
    }

    /// Set the flush interval in blocks used while catching up.
    pub fn flush_interval(mut self, blocks: i64) -> Self {
        self.config.flush_interval = blocks;
        self
    }

    pub fn development_mode(mut self, enabled: bool) -> Self {
        self.config.development_mode = enabled;
        self
    }

    pub fn irreversible_only(mut self, enabled: bool) -> Self {
        self.config.irreversible_only = enabled;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<SinkerConfig, SinkError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
