//! chainsink-core: checkpoint-and-flush controller for block-scoped database changes.
//!
//! # Architecture
//!
//! ```text
//! BlockSource ──(cursor, block)──► SinkController::handle
//!                                      ├── ChangeApplier     (DatabaseChanges → TableStore calls)
//!                                      ├── FlushScheduler    (per block when live, batched otherwise)
//!                                      │     └── LivenessChecker
//!                                      ├── CheckpointManager (cursor bootstrap / flush / persist)
//!                                      └── MetricsSink       (flush counters, stats reporter)
//! ```

pub mod applier;
pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod error;
pub mod flush;
pub mod liveness;
pub mod metrics;
pub mod pb;
pub mod range;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use applier::{decode_changes, ChangeApplier};
pub use checkpoint::{CheckpointManager, CursorStore, MemoryCursorStore};
pub use config::{SinkerBuilder, SinkerConfig};
pub use cursor::Cursor;
pub use error::SinkError;
pub use flush::FlushScheduler;
pub use liveness::LivenessChecker;
pub use metrics::{FlushStats, MetricsSink, SinkStats};
pub use range::resolve_block_range;
pub use shutdown::Shutdown;
pub use sink::{SinkController, SinkState};
pub use source::{BlockSource, BlockStream, ExecutionMode, ReplaySource, StreamRequest};
pub use store::TableStore;
pub use types::{BlockRange, BlockRef, BlockScopedData, ForkStep, ModuleOutput, OutputModule};
