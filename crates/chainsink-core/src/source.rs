//! Block source trait, an abstraction over the block-streaming transport.
//!
//! The source owns fork handling: it delivers `New`/`Undo`/`Irreversible`
//! steps already resolved, resumes right after the request cursor, and
//! stops at the range end. The controller pulls items one at a time, so a
//! slow handler back-pressures the source.

use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::cursor::Cursor;
use crate::error::SinkError;
use crate::shutdown::Shutdown;
use crate::types::{BlockRange, BlockRef, BlockScopedData, ForkStep, OutputModule};

/// A stream of `(cursor, block)` items from a block source.
pub type BlockStream = Pin<Box<dyn Stream<Item = Result<(Cursor, BlockScopedData), SinkError>> + Send>>;

/// Module execution mode requested from the upstream engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Production,
    /// Relaxed upstream validation; forwarded as-is.
    Development,
}

/// Everything a block source needs to open a subscription.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub module: OutputModule,
    pub range: BlockRange,
    /// Resume position; a blank cursor means "start at `range.start()`".
    pub cursor: Cursor,
    /// Steps the consumer wants to receive.
    pub steps: Vec<ForkStep>,
    /// Size of the source-side undo buffer; 0 = source default.
    pub undo_buffer_size: usize,
    pub mode: ExecutionMode,
}

impl StreamRequest {
    /// Returns `true` if blocks with `step` should be delivered.
    pub fn wants(&self, step: ForkStep) -> bool {
        self.steps.contains(&step)
    }
}

/// Abstracts over concrete streaming backends.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Open a subscription. The stream must end once `shutdown` fires.
    async fn subscribe(&self, request: StreamRequest, shutdown: Shutdown) -> Result<BlockStream, SinkError>;
}

// ─── Replay source ────────────────────────────────────────────────────────────

/// Block source replaying a fixed list of blocks.
///
/// Honours the request range, step filter and cursor: a non-blank cursor
/// resumes strictly after its block. Useful for tests and local replays.
#[derive(Default)]
pub struct ReplaySource {
    blocks: Vec<BlockScopedData>,
    requests: Mutex<Vec<StreamRequest>>,
}

impl ReplaySource {
    pub fn new(blocks: Vec<BlockScopedData>) -> Self {
        Self {
            blocks,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Cursor token the replay source attaches to `block`.
    pub fn cursor_for(block: &BlockRef) -> Cursor {
        Cursor::new(format!("replay:{}:{}", block.number, block.id), block.clone())
    }
}

#[async_trait]
impl BlockSource for ReplaySource {
    async fn subscribe(&self, request: StreamRequest, shutdown: Shutdown) -> Result<BlockStream, SinkError> {
        let resume_after = (!request.cursor.is_blank()).then(|| request.cursor.block_number());
        let items: Vec<_> = self
            .blocks
            .iter()
            .filter(|b| request.range.contains(b.number()))
            .filter(|b| resume_after.map_or(true, |after| b.number() > after))
            .filter(|b| request.wants(b.step))
            .map(|b| Ok((Self::cursor_for(&b.block), b.clone())))
            .collect();

        tracing::debug!(
            range = %request.range,
            cursor = %request.cursor,
            blocks = items.len(),
            "Replay subscription opened"
        );
        self.requests.lock().unwrap().push(request);

        let stream = futures::stream::iter(items).take_until(async move { shutdown.terminated().await });
        Ok(Box::pin(stream))
    }
}
