//! Liveness check: has the stream caught up with the chain tip?

use chrono::{DateTime, Duration, Utc};

use crate::error::SinkError;
use crate::types::BlockScopedData;

/// Tells whether a block is within `delta` of wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct LivenessChecker {
    delta: Duration,
}

impl LivenessChecker {
    pub fn new(delta: Duration) -> Result<Self, SinkError> {
        if delta < Duration::zero() {
            return Err(SinkError::Config(format!(
                "live block time delta must not be negative, got {delta}"
            )));
        }
        Ok(Self { delta })
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Returns `true` if `block` was produced at most `delta` ago.
    pub fn is_live(&self, block: &BlockScopedData) -> bool {
        self.is_live_at(block, Utc::now())
    }

    pub fn is_live_at(&self, block: &BlockScopedData, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(block.timestamp) <= self.delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockRef, ForkStep};

    fn block_at(timestamp: DateTime<Utc>) -> BlockScopedData {
        BlockScopedData {
            step: ForkStep::New,
            block: BlockRef::new("0xa", 1),
            timestamp,
            outputs: vec![],
        }
    }

    #[test]
    fn negative_delta_rejected() {
        assert!(LivenessChecker::new(Duration::seconds(-1)).is_err());
        assert!(LivenessChecker::new(Duration::zero()).is_ok());
    }

    #[test]
    fn live_within_delta() {
        let checker = LivenessChecker::new(Duration::seconds(300)).unwrap();
        let now = Utc::now();
        assert!(checker.is_live_at(&block_at(now - Duration::seconds(299)), now));
        assert!(checker.is_live_at(&block_at(now - Duration::seconds(300)), now));
        assert!(!checker.is_live_at(&block_at(now - Duration::seconds(301)), now));
    }

    #[test]
    fn future_block_is_live() {
        let checker = LivenessChecker::new(Duration::seconds(1)).unwrap();
        let now = Utc::now();
        assert!(checker.is_live_at(&block_at(now + Duration::seconds(10)), now));
    }

    #[test]
    fn historical_block_is_not_live() {
        let checker = LivenessChecker::new(Duration::seconds(300)).unwrap();
        let old = DateTime::<Utc>::from_timestamp(1_438_269_988, 0).unwrap();
        assert!(!checker.is_live(&block_at(old)));
    }
}
