//! Test doubles shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::checkpoint::{CursorStore, MemoryCursorStore};
use crate::cursor::Cursor;
use crate::error::SinkError;
use crate::store::TableStore;

/// Table store that records every accepted call as a line of text.
#[derive(Default)]
pub(crate) struct RecordingStore {
    tables: Vec<String>,
    calls: Mutex<Vec<String>>,
    pending: Mutex<u64>,
    flushed_blocks: Mutex<Vec<u64>>,
    failures: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
    cursors: MemoryCursorStore,
}

impl RecordingStore {
    pub(crate) fn with_tables(tables: &[&str]) -> Self {
        let mut tables: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        tables.sort();
        Self {
            tables,
            ..Default::default()
        }
    }

    /// Make every subsequent `op` call fail ("insert", "update", "delete", "flush", "save").
    pub(crate) fn fail_on(&self, op: &str) {
        self.failures.lock().unwrap().insert(op.to_string());
    }

    /// Make every subsequent `op` call hang forever ("flush", "save").
    pub(crate) fn stall_on(&self, op: &str) {
        self.stalled.lock().unwrap().insert(op.to_string());
    }

    async fn maybe_stall(&self, op: &str) {
        let stalled = self.stalled.lock().unwrap().contains(op);
        if stalled {
            futures::future::pending::<()>().await;
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn flushed_blocks(&self) -> Vec<u64> {
        self.flushed_blocks.lock().unwrap().clone()
    }

    pub(crate) fn cursor(&self, key: &str) -> Option<Cursor> {
        self.cursors.get(key)
    }

    fn check(&self, op: &str) -> Result<(), SinkError> {
        if self.failures.lock().unwrap().contains(op) {
            return Err(SinkError::Storage(format!("injected {op} failure")));
        }
        Ok(())
    }

    fn record(&self, op: &str, table: &str, pk: &str, fields: Option<HashMap<String, String>>) {
        let mut line = format!("{op} {table}/{pk}");
        if let Some(fields) = fields {
            let mut pairs: Vec<_> = fields.into_iter().collect();
            pairs.sort();
            for (name, value) in pairs {
                line.push_str(&format!(" {name}={value}"));
            }
        }
        self.calls.lock().unwrap().push(line);
        *self.pending.lock().unwrap() += 1;
    }
}

#[async_trait]
impl CursorStore for RecordingStore {
    async fn load_cursor(&self, key: &str) -> Result<Option<Cursor>, SinkError> {
        self.cursors.load_cursor(key).await
    }

    async fn save_cursor(&self, key: &str, cursor: &Cursor) -> Result<(), SinkError> {
        self.check("save")?;
        self.maybe_stall("save").await;
        self.cursors.save_cursor(key, cursor).await
    }

    async fn delete_cursor(&self, key: &str) -> Result<(), SinkError> {
        self.cursors.delete_cursor(key).await
    }
}

#[async_trait]
impl TableStore for RecordingStore {
    fn identifier(&self) -> String {
        "recording-store".into()
    }

    fn has_table(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    fn available_tables(&self) -> Vec<String> {
        self.tables.clone()
    }

    fn insert(&self, table: &str, pk: &str, fields: HashMap<String, String>) -> Result<(), SinkError> {
        self.check("insert")?;
        self.record("insert", table, pk, Some(fields));
        Ok(())
    }

    fn update(&self, table: &str, pk: &str, fields: HashMap<String, String>) -> Result<(), SinkError> {
        self.check("update")?;
        self.record("update", table, pk, Some(fields));
        Ok(())
    }

    fn delete(&self, table: &str, pk: &str) -> Result<(), SinkError> {
        self.check("delete")?;
        self.record("delete", table, pk, None);
        Ok(())
    }

    fn entries_count(&self) -> u64 {
        *self.pending.lock().unwrap()
    }

    async fn flush(&self, key: &str, cursor: &Cursor) -> Result<(), SinkError> {
        *self.pending.lock().unwrap() = 0;
        self.check("flush")?;
        self.maybe_stall("flush").await;
        self.cursors.save_cursor(key, cursor).await?;
        self.flushed_blocks.lock().unwrap().push(cursor.block_number());
        Ok(())
    }
}
