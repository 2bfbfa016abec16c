//! Flush scheduling: per-block near the tip, batched during replay.

use crate::liveness::LivenessChecker;
use crate::types::BlockScopedData;

/// Flush modulo used while live: every block is flushed.
pub const LIVE_FLUSH_MODULO: u64 = 1;

/// Flush modulo used when not live and no positive interval is configured.
pub const DEFAULT_FLUSH_MODULO: u64 = 100;

/// Decides whether a processed block is a flush boundary.
#[derive(Debug, Clone, Copy)]
pub struct FlushScheduler {
    liveness: LivenessChecker,
    /// Configured interval in blocks; `<= 0` means "use the default".
    interval: i64,
}

impl FlushScheduler {
    pub fn new(liveness: LivenessChecker, interval: i64) -> Self {
        Self { liveness, interval }
    }

    /// Modulo applied to the block number. Never 0.
    pub fn modulo(&self, block: &BlockScopedData) -> u64 {
        if self.liveness.is_live(block) {
            return LIVE_FLUSH_MODULO;
        }
        self.batch_modulo()
    }

    /// Modulo used when the block is not live.
    pub fn batch_modulo(&self) -> u64 {
        if self.interval > 0 {
            self.interval as u64
        } else {
            DEFAULT_FLUSH_MODULO
        }
    }

    pub fn should_flush(&self, block: &BlockScopedData) -> bool {
        block.number() % self.modulo(block) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockRef, ForkStep};
    use chrono::{DateTime, Duration, Utc};

    fn historical(number: u64) -> BlockScopedData {
        BlockScopedData {
            step: ForkStep::New,
            block: BlockRef::new(format!("0x{number:x}"), number),
            timestamp: DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap(),
            outputs: vec![],
        }
    }

    fn live(number: u64) -> BlockScopedData {
        BlockScopedData {
            timestamp: Utc::now(),
            ..historical(number)
        }
    }

    fn scheduler(interval: i64) -> FlushScheduler {
        FlushScheduler::new(LivenessChecker::new(Duration::seconds(300)).unwrap(), interval)
    }

    #[test]
    fn live_blocks_always_flush() {
        for interval in [-1, 0, 10, 1000] {
            let s = scheduler(interval);
            for n in [1, 7, 99, 1001] {
                assert_eq!(s.modulo(&live(n)), LIVE_FLUSH_MODULO);
                assert!(s.should_flush(&live(n)));
            }
        }
    }

    #[test]
    fn configured_interval_when_not_live() {
        let s = scheduler(10);
        let flushed: Vec<u64> = (1..=35).filter(|n| s.should_flush(&historical(*n))).collect();
        assert_eq!(flushed, vec![10, 20, 30]);
    }

    #[test]
    fn non_positive_interval_falls_back_to_default() {
        for interval in [0, -5, i64::MIN] {
            let s = scheduler(interval);
            assert_eq!(s.modulo(&historical(1)), DEFAULT_FLUSH_MODULO);
            assert!(!s.should_flush(&historical(50)));
            assert!(s.should_flush(&historical(200)));
        }
    }
}
