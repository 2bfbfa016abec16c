//! chainsink-storage: table store backends for chainsink.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - `postgres`: PostgreSQL via `sqlx` (feature `postgres`)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryLoader;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresLoader, PostgresOptions};
