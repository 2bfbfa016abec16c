//! Flush metrics and the periodic stats reporter.
//!
//! Counters are monotonic and only move at flush boundaries. They are
//! written from the block-processing task and read by the reporter task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::shutdown::Shutdown;

/// Interval between two stats log lines.
pub const STATS_INTERVAL: Duration = Duration::from_secs(2);

/// Point-in-time view of the flush counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushStats {
    /// Number of flushes performed.
    pub flush_count: u64,
    /// Cumulative number of entries written by flushes.
    pub flushed_entries: u64,
    /// Cumulative time spent flushing, in nanoseconds.
    pub flush_duration_nanos: u64,
    /// Block number of the last flushed cursor.
    pub last_flushed_block: Option<u64>,
}

impl FlushStats {
    pub fn flush_duration(&self) -> Duration {
        Duration::from_nanos(self.flush_duration_nanos)
    }
}

/// Sink for flush metrics, injected into the controller.
pub trait MetricsSink: Send + Sync {
    /// Record one completed flush.
    fn record_flush(&self, block_number: u64, entries: u64, duration: Duration);

    /// Current counter values.
    fn snapshot(&self) -> FlushStats;
}

/// Default lock-free [`MetricsSink`].
#[derive(Debug, Default)]
pub struct SinkStats {
    flush_count: AtomicU64,
    flushed_entries: AtomicU64,
    flush_duration_nanos: AtomicU64,
    /// `u64::MAX` until the first flush.
    last_flushed_block: AtomicU64,
}

impl SinkStats {
    pub fn new() -> Self {
        Self {
            last_flushed_block: AtomicU64::new(u64::MAX),
            ..Default::default()
        }
    }
}

impl MetricsSink for SinkStats {
    fn record_flush(&self, block_number: u64, entries: u64, duration: Duration) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        self.flushed_entries.fetch_add(entries, Ordering::Relaxed);
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.flush_duration_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.last_flushed_block.store(block_number, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FlushStats {
        let last = self.last_flushed_block.load(Ordering::Relaxed);
        FlushStats {
            flush_count: self.flush_count.load(Ordering::Relaxed),
            flushed_entries: self.flushed_entries.load(Ordering::Relaxed),
            flush_duration_nanos: self.flush_duration_nanos.load(Ordering::Relaxed),
            last_flushed_block: (last != u64::MAX).then_some(last),
        }
    }
}

/// Spawn a task logging `metrics` every `interval` until `shutdown` fires.
pub fn spawn_stats_reporter(
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let mut previous = metrics.snapshot();

        loop {
            tokio::select! {
                _ = shutdown.terminated() => break,
                _ = ticker.tick() => {
                    let current = metrics.snapshot();
                    let per_sec = (current.flushed_entries - previous.flushed_entries) as f64
                        / interval.as_secs_f64();
                    tracing::info!(
                        flush_count = current.flush_count,
                        flushed_entries = current.flushed_entries,
                        entries_per_sec = per_sec,
                        flush_duration_ms = current.flush_duration().as_millis() as u64,
                        last_flushed_block = ?current.last_flushed_block,
                        "Sink stats"
                    );
                    previous = current;
                }
            }
        }
        tracing::debug!("Stats reporter stopped");
    })
}
