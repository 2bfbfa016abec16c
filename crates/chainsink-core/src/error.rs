//! Error types for the chainsink pipeline.

use thiserror::Error;

/// Errors that can occur while sinking block-scoped changes.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no cursor stored under key {key}")]
    CursorNotFound { key: String },

    #[error(
        "received a change for table '{table}' unknown to {store} (available tables: {})",
        available.join(", ")
    )]
    SchemaMismatch {
        table: String,
        store: String,
        available: Vec<String>,
    },

    #[error("database {operation} on table '{table}' (pk '{pk}'): {reason}")]
    Apply {
        operation: &'static str,
        table: String,
        pk: String,
        reason: String,
    },

    #[error("decode database changes: {0}")]
    Decode(String),

    #[error("flush failed at block #{block_number}: {reason}")]
    Flush { block_number: u64, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("block source error: {0}")]
    Source(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

impl SinkError {
    /// Returns `true` when no cursor exists yet (recoverable, triggers bootstrap).
    pub fn is_cursor_not_found(&self) -> bool {
        matches!(self, Self::CursorNotFound { .. })
    }
}
