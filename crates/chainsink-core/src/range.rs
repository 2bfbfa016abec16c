//! Block range resolution from the `start[:end]` textual form.

use crate::error::SinkError;
use crate::types::{BlockRange, OutputModule};

/// Resolve `expr` into a concrete [`BlockRange`] for `module`.
///
/// - `""` or `":"` → `[module.initial_block, ∞)`
/// - `"a"` or `"a:"` → `[a, ∞)`
/// - `":b"` → `[module.initial_block, b)`
/// - `"a:b"` → `[a, b)`
pub fn resolve_block_range(expr: &str, module: &OutputModule) -> Result<BlockRange, SinkError> {
    let expr = expr.trim();
    let mut parts = expr.splitn(3, ':');
    let start_part = parts.next().unwrap_or_default().trim();
    let end_part = parts.next().unwrap_or_default().trim();
    if parts.next().is_some() {
        return Err(SinkError::Config(format!(
            "invalid block range '{expr}': expected <start>[:<end>]"
        )));
    }

    let start = if start_part.is_empty() {
        module.initial_block
    } else {
        parse_block_number(start_part, expr)?
    };
    let end = if end_part.is_empty() {
        None
    } else {
        Some(parse_block_number(end_part, expr)?)
    };

    BlockRange::new(start, end).ok_or_else(|| {
        SinkError::Config(format!(
            "invalid block range '{expr}': start block {start} is above end block {}",
            end.unwrap_or_default()
        ))
    })
}

fn parse_block_number(part: &str, expr: &str) -> Result<u64, SinkError> {
    part.parse::<u64>().map_err(|e| {
        SinkError::Config(format!(
            "invalid block range '{expr}': '{part}' is not a block number: {e}"
        ))
    })
}
