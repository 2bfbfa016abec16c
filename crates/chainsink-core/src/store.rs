//! Table store trait: the relational target the sink writes into.
//!
//! Mutations are buffered by the store and only become durable on
//! [`TableStore::flush`], which also persists the cursor in the same
//! transaction: a persisted cursor implies its changes are durable.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::checkpoint::CursorStore;
use crate::cursor::Cursor;
use crate::error::SinkError;

/// Implementations include `MemoryLoader` and `PostgresLoader`
/// in `chainsink-storage`.
#[async_trait]
pub trait TableStore: CursorStore {
    /// Human-readable identity of the store (used in error messages).
    fn identifier(&self) -> String;

    /// Returns `true` if `table` exists in the target schema.
    fn has_table(&self, table: &str) -> bool;

    /// Names of every table in the target schema, sorted.
    fn available_tables(&self) -> Vec<String>;

    /// Buffer a row insertion.
    fn insert(&self, table: &str, pk: &str, fields: HashMap<String, String>) -> Result<(), SinkError>;

    /// Buffer a row update (only the given columns change).
    fn update(&self, table: &str, pk: &str, fields: HashMap<String, String>) -> Result<(), SinkError>;

    /// Buffer a row deletion.
    fn delete(&self, table: &str, pk: &str) -> Result<(), SinkError>;

    /// Number of buffered mutations not yet flushed.
    fn entries_count(&self) -> u64;

    /// Make every buffered mutation durable together with `cursor`.
    ///
    /// The buffer is consumed either way. On error nothing is committed.
    async fn flush(&self, key: &str, cursor: &Cursor) -> Result<(), SinkError>;
}
