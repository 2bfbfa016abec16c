//! Sink cursor: the resumable position paired with the last applied block.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::BlockRef;

/// The sink's position in the stream.
///
/// The cursor knows:
/// - The opaque token the block source needs to resume exactly after a block
/// - Which block that token points to
///
/// A cursor with an empty token is *blank*: it only carries a block
/// reference, used when bootstrapping a sink that never ran before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Opaque resumption token issued by the block source.
    pub token: String,
    /// Block this cursor points to.
    pub block: BlockRef,
}

impl Cursor {
    pub fn new(token: impl Into<String>, block: BlockRef) -> Self {
        Self {
            token: token.into(),
            block,
        }
    }

    /// A cursor without resumption token, positioned at `block_number`.
    pub fn blank(block_number: u64) -> Self {
        Self::new("", BlockRef::new("", block_number))
    }

    /// Returns `true` if no upstream token is attached.
    pub fn is_blank(&self) -> bool {
        self.token.is_empty()
    }

    pub fn block_number(&self) -> u64 {
        self.block.number
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            write!(f, "blank cursor at {}", self.block)
        } else {
            write!(f, "cursor {} at {}", self.token, self.block)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cursor() {
        let cursor = Cursor::blank(99);
        assert!(cursor.is_blank());
        assert_eq!(cursor.block_number(), 99);
        assert_eq!(cursor.to_string(), "blank cursor at #99");
    }

    #[test]
    fn cursor_with_token() {
        let cursor = Cursor::new("c1:abc", BlockRef::new("0xaaa", 500));
        assert!(!cursor.is_blank());
        assert_eq!(cursor.to_string(), "cursor c1:abc at #500 (0xaaa)");
    }

    #[test]
    fn cursor_serde_roundtrip() {
        let cursor = Cursor::new("tok", BlockRef::new("0xbb", 7));
        let json = serde_json::to_string(&cursor).unwrap();
        let back: Cursor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cursor);
    }
}
