//! Size-driven partitioning of the compare-column list.
//!
//! Athena rejects query text over a byte ceiling, and the comparison query
//! grows with every compare column. [`plan`] splits the column list into the
//! subsets that will actually run: the full list if it fits, otherwise
//! contiguous halves bisected until each compiles under the ceiling.
//!
//! Splitting runs on an explicit work stack instead of native recursion, so
//! pathological column counts cannot overflow the call stack. Ranges are
//! processed depth-first, left half before right, which keeps the finished
//! leaves in original column order.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::core::{ColumnSubset, ComparisonSpec};
use crate::error::{ReconError, Result};
use crate::query::compile;

/// Partition a comparison's compare columns into subsets whose compiled
/// queries each fit under `ceiling` bytes.
///
/// The returned subsets concatenate, in order, to exactly the original
/// compare-column list. Fails with [`ReconError::SizeExceeded`] when a
/// single column's query is still over the ceiling, naming that column.
pub fn plan(spec: &ComparisonSpec, ceiling: usize) -> Result<Vec<ColumnSubset>> {
    let full: Arc<Vec<String>> = Arc::new(spec.compare_columns.clone());
    let mut leaves: Vec<ColumnSubset> = Vec::new();
    let mut stack: Vec<Range<usize>> = vec![0..full.len()];

    while let Some(range) = stack.pop() {
        let subset = ColumnSubset::new(Arc::clone(&full), range.clone());
        let compiled = compile(spec, &subset);

        if compiled.bytes <= ceiling {
            debug!(
                columns = subset.len(),
                bytes = compiled.bytes,
                subset = %subset.label(),
                "Subset fits under size ceiling"
            );
            leaves.push(subset);
            continue;
        }

        if range.len() == 1 {
            return Err(ReconError::SizeExceeded {
                column: full[range.start].clone(),
                bytes: compiled.bytes,
                ceiling,
            });
        }

        debug!(
            columns = range.len(),
            bytes = compiled.bytes,
            ceiling,
            subset = %subset.label(),
            "Query over size ceiling, bisecting"
        );
        let mid = range.start + range.len() / 2;
        // Right pushed first so the left half is processed next.
        stack.push(mid..range.end);
        stack.push(range.start..mid);
    }

    Ok(leaves)
}
