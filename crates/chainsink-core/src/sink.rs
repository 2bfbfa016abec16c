//! The sink controller. Drives blocks from the source into the table store.
//!
//! # Lifecycle
//! `Created → Started → Running → Terminating → Stopped`
//!
//! # Per block
//!   - Decode and apply the configured module's `DatabaseChanges`
//!   - Remember the block cursor as the last applied position
//!   - On a flush boundary, commit buffered changes together with the cursor
//!
//! # Termination
//! On clean termination the remaining buffered changes are committed with the
//! last cursor, bounded by [`STOP_GRACE_PERIOD`]. On error nothing is written, so a restart resumes
//! from the last flushed cursor and re-applies the blocks after it.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::applier::{decode_changes, ChangeApplier};
use crate::checkpoint::CheckpointManager;
use crate::config::SinkerConfig;
use crate::cursor::Cursor;
use crate::error::SinkError;
use crate::flush::FlushScheduler;
use crate::liveness::LivenessChecker;
use crate::metrics::{spawn_stats_reporter, MetricsSink, STATS_INTERVAL};
use crate::range::resolve_block_range;
use crate::shutdown::Shutdown;
use crate::source::{BlockSource, ExecutionMode, StreamRequest};
use crate::store::TableStore;
use crate::types::{BlockRange, BlockScopedData, ForkStep, OutputModule};

/// Upper bound for the final checkpoint write on termination.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Runtime state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Constructed, nothing loaded yet.
    Created,
    /// Cursor loaded or bootstrapped.
    Started,
    /// Subscribed and processing blocks.
    Running,
    /// Shutting down, final checkpoint in progress.
    Terminating,
    /// Terminated.
    Stopped,
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Running => write!(f, "running"),
            Self::Terminating => write!(f, "terminating"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Checkpoint-and-flush controller for one output module.
pub struct SinkController {
    config: SinkerConfig,
    module: OutputModule,
    range: BlockRange,
    applier: ChangeApplier,
    scheduler: FlushScheduler,
    checkpoint: CheckpointManager,
    source: Arc<dyn BlockSource>,
    metrics: Arc<dyn MetricsSink>,
    shutdown: Shutdown,
    stats_interval: Duration,
    stats_task: Option<JoinHandle<()>>,
    last_cursor: Option<Cursor>,
    state: SinkState,
}

impl SinkController {
    /// Build a controller. Fails on an invalid range or liveness delta.
    pub fn new(
        config: SinkerConfig,
        module: OutputModule,
        store: Arc<dyn TableStore>,
        source: Arc<dyn BlockSource>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, SinkError> {
        config.validate()?;
        let range = resolve_block_range(&config.block_range, &module)?;
        let liveness = LivenessChecker::new(config.live_block_time_delta()?)?;

        Ok(Self {
            applier: ChangeApplier::new(Arc::clone(&store)),
            scheduler: FlushScheduler::new(liveness, config.flush_interval),
            checkpoint: CheckpointManager::new(store, &module, range),
            config,
            module,
            range,
            source,
            metrics,
            shutdown: Shutdown::new(),
            stats_interval: STATS_INTERVAL,
            stats_task: None,
            last_cursor: None,
            state: SinkState::Created,
        })
    }

    /// Override the stats reporting interval.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn range(&self) -> BlockRange {
        self.range
    }

    /// Cursor of the last block whose changes were applied.
    pub fn last_cursor(&self) -> Option<&Cursor> {
        self.last_cursor.as_ref()
    }

    /// Handle to request termination from another task.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Request termination; the running loop exits before the next block.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Load (or bootstrap) the cursor, start the stats reporter, then [`run`](Self::run).
    pub async fn start(&mut self) -> Result<(), SinkError> {
        let cursor = self.checkpoint.load_or_initialize().await?;
        self.state = SinkState::Started;
        info!(
            module = %self.module.name,
            range = %self.range,
            %cursor,
            "Starting sink"
        );

        self.stats_task = Some(spawn_stats_reporter(
            Arc::clone(&self.metrics),
            self.stats_interval,
            self.shutdown.clone(),
        ));

        self.run().await
    }

    /// Stream blocks until the range ends, an error occurs or shutdown is requested.
    pub async fn run(&mut self) -> Result<(), SinkError> {
        let result = self.stream().await;
        self.terminate(result).await
    }

    async fn stream(&mut self) -> Result<(), SinkError> {
        let cursor = self.checkpoint.get().await?;
        let request = self.stream_request(cursor);
        debug!(steps = ?request.steps, undo_buffer_size = request.undo_buffer_size, "Subscribing to block source");

        let mut blocks = self.source.subscribe(request, self.shutdown.clone()).await?;
        self.state = SinkState::Running;

        let shutdown = self.shutdown.clone();
        let terminated = shutdown.terminated();
        tokio::pin!(terminated);

        loop {
            let item = tokio::select! {
                biased;
                _ = &mut terminated => {
                    info!("Shutdown requested, leaving block stream");
                    return Ok(());
                }
                item = blocks.next() => item,
            };

            match item {
                Some(Ok((cursor, block))) => self.handle(cursor, block).await?,
                Some(Err(e)) => return Err(e),
                None => {
                    info!(last_cursor = ?self.last_cursor.as_ref().map(Cursor::block_number), "Block stream ended");
                    return Ok(());
                }
            }
        }
    }

    /// Subscription parameters derived from the configuration.
    pub fn stream_request(&self, cursor: Cursor) -> StreamRequest {
        let steps = if self.config.irreversible_only {
            vec![ForkStep::Irreversible]
        } else {
            vec![ForkStep::New, ForkStep::Undo]
        };
        let mode = if self.config.development_mode {
            ExecutionMode::Development
        } else {
            ExecutionMode::Production
        };

        StreamRequest {
            module: self.module.clone(),
            range: self.range,
            cursor,
            steps,
            undo_buffer_size: self.config.undo_buffer_size,
            mode,
        }
    }

    /// Apply one block and flush when it falls on a flush boundary.
    pub async fn handle(&mut self, cursor: Cursor, block: BlockScopedData) -> Result<(), SinkError> {
        for output in block.outputs_for(&self.module.name) {
            let changes = decode_changes(&output.payload)?;
            self.applier.apply(&changes)?;
        }

        let cursor = self.last_cursor.insert(cursor);

        if self.scheduler.should_flush(&block) {
            let started = Instant::now();
            let entries = self.checkpoint.flush(cursor).await?;
            let elapsed = started.elapsed();
            self.metrics.record_flush(block.number(), entries, elapsed);
            debug!(
                block = block.number(),
                entries,
                elapsed_ms = elapsed.as_millis() as u64,
                "Flushed"
            );
        }
        Ok(())
    }

    /// Commit pending changes with the last cursor unless nothing was handled
    /// or `err` is set.
    pub async fn stop(&self, err: Option<&SinkError>) -> Result<(), SinkError> {
        let Some(cursor) = &self.last_cursor else {
            return Ok(());
        };
        if err.is_some() {
            debug!(%cursor, "Not persisting cursor after error");
            return Ok(());
        }

        let entries = self.checkpoint.flush(cursor).await?;
        info!(%cursor, entries, "Persisted final cursor");
        Ok(())
    }

    async fn terminate(&mut self, result: Result<(), SinkError>) -> Result<(), SinkError> {
        if self.state == SinkState::Stopped {
            return result;
        }
        self.state = SinkState::Terminating;
        self.shutdown.trigger();

        match &result {
            Ok(()) => info!("Terminating sink"),
            Err(e) => error!(error = %e, "Terminating sink on error"),
        }

        let stopped = match tokio::time::timeout(STOP_GRACE_PERIOD, self.stop(result.as_ref().err())).await {
            Ok(stopped) => stopped,
            Err(_) => {
                warn!("Final cursor write abandoned after grace period");
                Err(SinkError::Timeout {
                    operation: "final cursor write",
                    secs: STOP_GRACE_PERIOD.as_secs(),
                })
            }
        };

        if let Some(task) = self.stats_task.take() {
            let _ = task.await;
        }
        self.state = SinkState::Stopped;

        result.and(stopped)
    }
}
