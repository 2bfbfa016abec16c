//! In-memory table store backend.
//!
//! Buffers mutations and applies them at flush time, together with the
//! cursor, all-or-nothing. Useful for tests and dry runs.
//! All data is lost when the process exits.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use chainsink_core::checkpoint::CursorStore;
use chainsink_core::cursor::Cursor;
use chainsink_core::error::SinkError;
use chainsink_core::store::TableStore;

/// A row: column name → value.
pub type Row = HashMap<String, String>;

#[derive(Debug, Clone)]
enum PendingOp {
    Insert { table: String, pk: String, fields: Row },
    Update { table: String, pk: String, fields: Row },
    Delete { table: String, pk: String },
}

/// In-memory loader with a fixed set of tables.
#[derive(Default)]
pub struct MemoryLoader {
    tables: BTreeSet<String>,
    rows: Mutex<HashMap<String, BTreeMap<String, Row>>>,
    pending: Mutex<Vec<PendingOp>>,
    cursors: Mutex<HashMap<String, Cursor>>,
}

impl MemoryLoader {
    /// Create a loader exposing `tables` as its schema.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Committed row of `table` with primary key `pk`.
    pub fn row(&self, table: &str, pk: &str) -> Option<Row> {
        self.rows.lock().unwrap().get(table)?.get(pk).cloned()
    }

    /// Number of committed rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.rows.lock().unwrap().get(table).map_or(0, |t| t.len())
    }

    /// Committed cursor stored under `key`.
    pub fn cursor(&self, key: &str) -> Option<Cursor> {
        self.cursors.lock().unwrap().get(key).cloned()
    }

    /// Drop buffered mutations, e.g. to simulate a crash before a flush.
    pub fn discard_pending(&self) -> usize {
        std::mem::take(&mut *self.pending.lock().unwrap()).len()
    }

    fn push(&self, op: PendingOp) {
        self.pending.lock().unwrap().push(op);
    }
}

/// Apply `op` to `rows`, mirroring SQL semantics: duplicate inserts fail,
/// updates and deletes of missing rows affect nothing.
fn apply_op(rows: &mut HashMap<String, BTreeMap<String, Row>>, op: PendingOp) -> Result<(), SinkError> {
    match op {
        PendingOp::Insert { table, pk, fields } => {
            let table_rows = rows.entry(table.clone()).or_default();
            if table_rows.contains_key(&pk) {
                return Err(SinkError::Storage(format!(
                    "duplicate primary key '{pk}' in table '{table}'"
                )));
            }
            table_rows.insert(pk, fields);
        }
        PendingOp::Update { table, pk, fields } => {
            if let Some(row) = rows.get_mut(&table).and_then(|t| t.get_mut(&pk)) {
                row.extend(fields);
            }
        }
        PendingOp::Delete { table, pk } => {
            if let Some(t) = rows.get_mut(&table) {
                t.remove(&pk);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl CursorStore for MemoryLoader {
    async fn load_cursor(&self, key: &str) -> Result<Option<Cursor>, SinkError> {
        Ok(self.cursor(key))
    }

    async fn save_cursor(&self, key: &str, cursor: &Cursor) -> Result<(), SinkError> {
        self.cursors.lock().unwrap().insert(key.to_string(), cursor.clone());
        Ok(())
    }

    async fn delete_cursor(&self, key: &str) -> Result<(), SinkError> {
        self.cursors.lock().unwrap().remove(key);
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryLoader {
    fn identifier(&self) -> String {
        "memory".into()
    }

    fn has_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    fn available_tables(&self) -> Vec<String> {
        self.tables.iter().cloned().collect()
    }

    fn insert(&self, table: &str, pk: &str, fields: Row) -> Result<(), SinkError> {
        self.push(PendingOp::Insert {
            table: table.to_string(),
            pk: pk.to_string(),
            fields,
        });
        Ok(())
    }

    fn update(&self, table: &str, pk: &str, fields: Row) -> Result<(), SinkError> {
        self.push(PendingOp::Update {
            table: table.to_string(),
            pk: pk.to_string(),
            fields,
        });
        Ok(())
    }

    fn delete(&self, table: &str, pk: &str) -> Result<(), SinkError> {
        self.push(PendingOp::Delete {
            table: table.to_string(),
            pk: pk.to_string(),
        });
        Ok(())
    }

    fn entries_count(&self) -> u64 {
        self.pending.lock().unwrap().len() as u64
    }

    async fn flush(&self, key: &str, cursor: &Cursor) -> Result<(), SinkError> {
        let ops = std::mem::take(&mut *self.pending.lock().unwrap());
        let entries = ops.len();

        let mut rows = self.rows.lock().unwrap();
        let mut staged = rows.clone();
        for op in ops {
            apply_op(&mut staged, op)?;
        }
        *rows = staged;
        self.cursors.lock().unwrap().insert(key.to_string(), cursor.clone());

        tracing::debug!(key, entries, block = cursor.block_number(), "Memory loader flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsink_core::types::BlockRef;

    fn fields(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn cursor(n: u64) -> Cursor {
        Cursor::new(format!("c{n}"), BlockRef::new(format!("0x{n}"), n))
    }

    #[test]
    fn schema_lookup() {
        let loader = MemoryLoader::new(["transfers", "accounts"]);
        assert!(loader.has_table("transfers"));
        assert!(!loader.has_table("ghost"));
        assert_eq!(loader.available_tables(), vec!["accounts", "transfers"]);
    }

    #[tokio::test]
    async fn mutations_are_invisible_until_flush() {
        let loader = MemoryLoader::new(["t"]);
        loader.insert("t", "1", fields(&[("a", "1")])).unwrap();
        loader.update("t", "1", fields(&[("b", "2")])).unwrap();
        assert_eq!(loader.entries_count(), 2);
        assert!(loader.row("t", "1").is_none());

        loader.flush("key", &cursor(10)).await.unwrap();
        assert_eq!(loader.entries_count(), 0);
        assert_eq!(loader.row("t", "1").unwrap(), fields(&[("a", "1"), ("b", "2")]));
        assert_eq!(loader.cursor("key").unwrap().block_number(), 10);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let loader = MemoryLoader::new(["t"]);
        loader.insert("t", "1", fields(&[])).unwrap();
        loader.insert("t", "2", fields(&[])).unwrap();
        loader.delete("t", "1").unwrap();
        loader.flush("key", &cursor(1)).await.unwrap();

        assert_eq!(loader.row_count("t"), 1);
        assert!(loader.row("t", "1").is_none());
    }

    #[tokio::test]
    async fn failed_flush_commits_nothing() {
        let loader = MemoryLoader::new(["t"]);
        loader.insert("t", "1", fields(&[("v", "old")])).unwrap();
        loader.flush("key", &cursor(1)).await.unwrap();

        loader.update("t", "1", fields(&[("v", "new")])).unwrap();
        loader.insert("t", "1", fields(&[])).unwrap();
        let err = loader.flush("key", &cursor(2)).await.unwrap_err();

        assert!(matches!(err, SinkError::Storage(_)));
        assert_eq!(loader.row("t", "1").unwrap()["v"], "old");
        assert_eq!(loader.cursor("key").unwrap().block_number(), 1);
    }

    #[tokio::test]
    async fn cursor_store_roundtrip() {
        let loader = MemoryLoader::new(["t"]);
        assert!(loader.load_cursor("k").await.unwrap().is_none());
        loader.save_cursor("k", &cursor(7)).await.unwrap();
        assert_eq!(loader.load_cursor("k").await.unwrap(), Some(cursor(7)));
        loader.delete_cursor("k").await.unwrap();
        assert!(loader.cursor("k").is_none());
    }
}
