//! Checkpoint manager. Persists the sink's cursor for crash recovery.
//!
//! A checkpoint is the cursor of the last block whose changes are durable.
//! On restart, the sink resumes right after it rather than re-sinking from
//! scratch. Cursors are only written at flush boundaries (together with the
//! buffered changes) and on clean shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::SinkError;
use crate::store::TableStore;
use crate::types::{BlockRange, OutputModule};

/// Trait for storing and loading cursors.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the cursor stored under `key`, if any.
    async fn load_cursor(&self, key: &str) -> Result<Option<Cursor>, SinkError>;

    /// Save (upsert) the cursor under `key`.
    async fn save_cursor(&self, key: &str, cursor: &Cursor) -> Result<(), SinkError>;

    /// Delete the cursor stored under `key` (e.g. when resetting a sink).
    async fn delete_cursor(&self, key: &str) -> Result<(), SinkError>;
}

/// Manages cursor reads/writes for one output module.
pub struct CheckpointManager {
    store: Arc<dyn TableStore>,
    key: String,
    range: BlockRange,
    initial_block: u64,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn TableStore>, module: &OutputModule, range: BlockRange) -> Self {
        Self {
            store,
            key: module.cursor_key(),
            range,
            initial_block: module.initial_block,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored cursor, failing with `CursorNotFound` when absent.
    pub async fn get(&self) -> Result<Cursor, SinkError> {
        self.store
            .load_cursor(&self.key)
            .await?
            .ok_or_else(|| SinkError::CursorNotFound {
                key: self.key.clone(),
            })
    }

    /// Block number a fresh sink starts from: just before the range start,
    /// never below the module's initial block.
    pub fn bootstrap_block(&self) -> u64 {
        self.range
            .start()
            .saturating_sub(1)
            .max(self.initial_block)
    }

    /// Create and persist the bootstrap cursor.
    pub async fn initialize(&self) -> Result<Cursor, SinkError> {
        let cursor = Cursor::blank(self.bootstrap_block());
        self.persist(&cursor)
            .await
            .map_err(|e| SinkError::Storage(format!("create initial cursor: {e}")))?;
        tracing::info!(key = %self.key, %cursor, "Initialized sink cursor");
        Ok(cursor)
    }

    /// Load the stored cursor, bootstrapping one on first run.
    pub async fn load_or_initialize(&self) -> Result<Cursor, SinkError> {
        match self.get().await {
            Ok(cursor) => Ok(cursor),
            Err(e) if e.is_cursor_not_found() => self.initialize().await,
            Err(e) => Err(e),
        }
    }

    /// Write `cursor` without flushing buffered changes.
    pub async fn persist(&self, cursor: &Cursor) -> Result<(), SinkError> {
        self.store.save_cursor(&self.key, cursor).await
    }

    /// Commit buffered changes together with `cursor`. Returns entries flushed.
    pub async fn flush(&self, cursor: &Cursor) -> Result<u64, SinkError> {
        let entries = self.store.entries_count();
        self.store
            .flush(&self.key, cursor)
            .await
            .map_err(|e| SinkError::Flush {
                block_number: cursor.block_number(),
                reason: e.to_string(),
            })?;
        Ok(entries)
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory cursor store for tests and ephemeral sinks.
#[derive(Default)]
pub struct MemoryCursorStore {
    data: Mutex<HashMap<String, Cursor>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the cursor stored under `key`.
    pub fn get(&self, key: &str) -> Option<Cursor> {
        self.data.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load_cursor(&self, key: &str) -> Result<Option<Cursor>, SinkError> {
        Ok(self.get(key))
    }

    async fn save_cursor(&self, key: &str, cursor: &Cursor) -> Result<(), SinkError> {
        self.data.lock().unwrap().insert(key.to_string(), cursor.clone());
        Ok(())
    }

    async fn delete_cursor(&self, key: &str) -> Result<(), SinkError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStore;
    use crate::types::BlockRef;

    fn manager(store: Arc<RecordingStore>, initial_block: u64, start: u64) -> CheckpointManager {
        let module = OutputModule::new("db_out", initial_block, vec![0xde, 0xad]);
        CheckpointManager::new(store, &module, BlockRange::new(start, Some(200)).unwrap())
    }

    #[tokio::test]
    async fn missing_cursor_is_not_found() {
        let mgr = manager(Arc::new(RecordingStore::default()), 0, 100);
        let err = mgr.get().await.unwrap_err();
        assert!(err.is_cursor_not_found());
    }

    #[tokio::test]
    async fn bootstrap_cursor_is_block_before_range_start() {
        let store = Arc::new(RecordingStore::default());
        let mgr = manager(store.clone(), 0, 100);

        let cursor = mgr.load_or_initialize().await.unwrap();
        assert!(cursor.is_blank());
        assert_eq!(cursor.block_number(), 99);
        assert_eq!(store.cursor("dead").unwrap(), cursor);
        assert_eq!(mgr.get().await.unwrap().block_number(), 99);
    }

    #[tokio::test]
    async fn bootstrap_never_goes_below_initial_block() {
        let mgr = manager(Arc::new(RecordingStore::default()), 150, 150);
        assert_eq!(mgr.bootstrap_block(), 150);

        let mgr = manager(Arc::new(RecordingStore::default()), 0, 0);
        assert_eq!(mgr.bootstrap_block(), 0);
    }

    #[tokio::test]
    async fn existing_cursor_is_not_overwritten() {
        let store = Arc::new(RecordingStore::default());
        let mgr = manager(store.clone(), 0, 100);
        let saved = Cursor::new("tok", BlockRef::new("0xaa", 150));
        mgr.persist(&saved).await.unwrap();

        assert_eq!(mgr.load_or_initialize().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn flush_failure_is_reported_with_block() {
        let store = Arc::new(RecordingStore::default());
        store.fail_on("flush");
        let mgr = manager(store.clone(), 0, 100);

        let err = mgr.flush(&Cursor::new("t", BlockRef::new("0x1", 120))).await.unwrap_err();
        assert!(matches!(err, SinkError::Flush { block_number: 120, .. }));
        assert!(store.cursor("dead").is_none());
    }

    #[tokio::test]
    async fn flush_reports_buffered_entries() {
        let store = Arc::new(RecordingStore::with_tables(&["t"]));
        store.insert("t", "1", HashMap::new()).unwrap();
        store.delete("t", "2").unwrap();
        let mgr = manager(store.clone(), 0, 100);

        let entries = mgr.flush(&Cursor::new("t", BlockRef::new("0x1", 110))).await.unwrap();
        assert_eq!(entries, 2);
        assert_eq!(store.entries_count(), 0);
        assert_eq!(store.cursor("dead").unwrap().block_number(), 110);
    }

    #[tokio::test]
    async fn memory_cursor_store_roundtrip() {
        let store = MemoryCursorStore::new();
        assert!(store.load_cursor("k").await.unwrap().is_none());

        let cursor = Cursor::new("tok", BlockRef::new("0xabc", 1000));
        store.save_cursor("k", &cursor).await.unwrap();
        assert_eq!(store.load_cursor("k").await.unwrap(), Some(cursor));

        store.delete_cursor("k").await.unwrap();
        assert!(store.get("k").is_none());
    }
}
