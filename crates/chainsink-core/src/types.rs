//! Shared types for the sink pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── BlockRef ────────────────────────────────────────────────────────────────

/// Identifies a single block by id (hash) and number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block id (hash). Empty for synthetic references.
    pub id: String,
    /// Block number.
    pub number: u64,
}

impl BlockRef {
    pub fn new(id: impl Into<String>, number: u64) -> Self {
        Self {
            id: id.into(),
            number,
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "#{}", self.number)
        } else {
            write!(f, "#{} ({})", self.number, self.id)
        }
    }
}

// ─── BlockRange ──────────────────────────────────────────────────────────────

/// A half-open block range `[start, end)`. `end = None` follows the live tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    start: u64,
    end: Option<u64>,
}

impl BlockRange {
    /// Returns `None` when `end < start`.
    pub fn new(start: u64, end: Option<u64>) -> Option<Self> {
        match end {
            Some(end) if end < start => None,
            _ => Some(Self { start, end }),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_none()
    }

    /// Returns `true` if `number` falls inside the range.
    pub fn contains(&self, number: u64) -> bool {
        number >= self.start && self.end.map_or(true, |end| number < end)
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "#{} - #{}", self.start, end),
            None => write!(f, "#{} - ∞", self.start),
        }
    }
}

// ─── ForkStep ────────────────────────────────────────────────────────────────

/// Finality status attached to each block by the block source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForkStep {
    /// A new block on the canonical chain (still reversible).
    New,
    /// A previously sent block that must be reverted.
    Undo,
    /// A block that can no longer be reorganized.
    Irreversible,
}

impl fmt::Display for ForkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Undo => write!(f, "undo"),
            Self::Irreversible => write!(f, "irreversible"),
        }
    }
}

// ─── BlockScopedData ─────────────────────────────────────────────────────────

/// One named module output carried by a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOutput {
    pub name: String,
    /// Opaque encoded payload (a `DatabaseChanges` message for the sink module).
    pub payload: Vec<u8>,
}

/// Everything the block source delivers for a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockScopedData {
    pub step: ForkStep,
    pub block: BlockRef,
    pub timestamp: DateTime<Utc>,
    pub outputs: Vec<ModuleOutput>,
}

impl BlockScopedData {
    pub fn number(&self) -> u64 {
        self.block.number
    }

    /// Outputs produced by the module named `name`, in delivery order.
    pub fn outputs_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ModuleOutput> + 'a {
        self.outputs.iter().filter(move |o| o.name == name)
    }
}

// ─── OutputModule ────────────────────────────────────────────────────────────

/// Metadata about the module whose output is sunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputModule {
    pub name: String,
    /// First block the module produces output for.
    pub initial_block: u64,
    /// Content hash of the module graph up to and including this module.
    pub hash: Vec<u8>,
}

impl OutputModule {
    pub fn new(name: impl Into<String>, initial_block: u64, hash: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            initial_block,
            hash: hash.into(),
        }
    }

    /// Key under which the cursor of this module is persisted.
    pub fn cursor_key(&self) -> String {
        hex::encode(&self.hash)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
