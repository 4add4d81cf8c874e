//! Reassembly of partial subset results into one report.
//!
//! Each compare-column subset executes independently and returns the same
//! join/remarks row shape; only the branch-5 difference entries vary by
//! subset. [`decode_rows`] validates one execution's fetched rows against
//! the compiled query shape, and [`ResultMerger`] folds any number of subset
//! results into a single [`DiffReport`] equal to what one unsplit execution
//! would have produced.
//!
//! Merge keys are `(join values, remarks)` tuples, never delimiter-joined
//! strings, so join values containing any separator cannot collide. Because
//! subsets partition the compare-column list, every column is contributed by
//! exactly one subset and overlay order cannot affect the result.

pub mod types;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

use crate::codec::{DIFF_FIELD, NULL_LITERAL};
use crate::core::{ColumnSubset, REMARKS_FIELD, REMARK_MATCHED};
use crate::error::{ReconError, Result};

pub use types::{DecodedRow, DiffReport, MergeKey, MergedRow, RawResultRow, RemarkCounts};

/// Split and decode one execution's fetched rows.
///
/// The first row must be the header `[join columns..., remarks,
/// diff_details]` exactly as the query aliases them; every data row must
/// have that width with a non-null remarks cell. A NULL condensed field
/// decodes as no differences.
pub fn decode_rows(
    join_columns: &[String],
    raw: Vec<Vec<Option<String>>>,
    execution_id: &str,
) -> Result<Vec<DecodedRow>> {
    let width = join_columns.len() + 2;
    let mut rows = raw.into_iter();

    let header = rows.next().ok_or_else(|| {
        ReconError::results(execution_id, "result set is empty, header row expected")
    })?;
    let expected: Vec<&str> = join_columns
        .iter()
        .map(String::as_str)
        .chain([REMARKS_FIELD, DIFF_FIELD])
        .collect();
    let header_ok = header.len() == width
        && header
            .iter()
            .zip(&expected)
            .all(|(cell, name)| cell.as_deref() == Some(*name));
    if !header_ok {
        return Err(ReconError::results(
            execution_id,
            format!("unexpected header row {:?}, expected {:?}", header, expected),
        ));
    }

    let mut decoded = Vec::new();
    for (index, mut row) in rows.enumerate() {
        if row.len() != width {
            return Err(ReconError::results(
                execution_id,
                format!(
                    "row {} has {} cells, expected {}",
                    index + 1,
                    row.len(),
                    width
                ),
            ));
        }
        let diff_field = row.pop().flatten().unwrap_or_default();
        let remarks = match row.pop().flatten() {
            Some(remarks) => remarks,
            None => {
                return Err(ReconError::results(
                    execution_id,
                    format!("row {} has a NULL remarks cell", index + 1),
                ))
            }
        };
        decoded.push(
            RawResultRow {
                join_values: row,
                remarks,
                diff_field,
            }
            .decode(),
        );
    }
    Ok(decoded)
}

/// Folds per-subset decoded rows into one canonical report.
///
/// Rows with remarks other than `matched` are produced identically by every
/// subset query: the first occurrence creates the merged row and later ones
/// collapse into it. Their per-subset key sets must agree exactly, which is
/// the merge's defense against a backend returning different row
/// populations for what should be the same filtered tables.
pub struct ResultMerger {
    join_columns: Vec<String>,
    full_columns: Vec<String>,
    column_index: HashMap<String, usize>,
    merged: BTreeMap<MergeKey, MergedRow>,
    /// Non-matched key set of the first folded subset.
    baseline: Option<BTreeSet<MergeKey>>,
}

impl ResultMerger {
    pub fn new(join_columns: Vec<String>, full_columns: Vec<String>) -> Self {
        let column_index = full_columns
            .iter()
            .enumerate()
            .map(|(index, column)| (column.clone(), index))
            .collect();
        Self {
            join_columns,
            full_columns,
            column_index,
            merged: BTreeMap::new(),
            baseline: None,
        }
    }

    /// Fold one subset's decoded rows into the report under construction.
    pub fn fold(&mut self, subset: &ColumnSubset, rows: Vec<DecodedRow>) -> Result<()> {
        debug_assert_eq!(subset.full_list(), self.full_columns.as_slice());
        let range = subset.range();
        let full_len = self.full_columns.len();
        let mut non_matched: BTreeSet<MergeKey> = BTreeSet::new();

        for row in rows {
            let key = MergeKey {
                join_values: row.join_values.clone(),
                remarks: row.remarks.clone(),
            };
            let matched = row.remarks == REMARK_MATCHED;
            if !matched {
                non_matched.insert(key.clone());
            }

            let entry = self.merged.entry(key).or_insert_with(|| MergedRow {
                join_values: row.join_values,
                remarks: row.remarks,
                values: vec![String::new(); full_len],
            });

            if !matched {
                if !row.diffs.is_empty() {
                    warn!(
                        remarks = %entry.remarks,
                        "Ignoring difference entries on a non-matched row"
                    );
                }
                continue;
            }

            for (column, pair) in row.diffs {
                let index = match self.column_index.get(&column) {
                    Some(&index) => index,
                    None => {
                        return Err(ReconError::MergeInconsistency {
                            key: render_key(&entry.join_values),
                            detail: format!("difference entry for unknown column {:?}", column),
                        })
                    }
                };
                if !range.contains(&index) {
                    return Err(ReconError::MergeInconsistency {
                        key: render_key(&entry.join_values),
                        detail: format!(
                            "difference entry for column {:?} outside producing subset {}",
                            column,
                            subset.label()
                        ),
                    });
                }
                entry.values[index] = pair;
            }
        }

        match &self.baseline {
            None => self.baseline = Some(non_matched),
            Some(baseline) => {
                if baseline != &non_matched {
                    if let Some(offending) = baseline.symmetric_difference(&non_matched).next() {
                        return Err(ReconError::MergeInconsistency {
                            key: render_key(&offending.join_values),
                            detail: format!(
                                "row classified {:?} by some subset queries but not others",
                                offending.remarks
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Finish folding and emit rows in canonical order.
    pub fn finish(self) -> DiffReport {
        DiffReport {
            join_columns: self.join_columns,
            compare_columns: self.full_columns,
            rows: self.merged.into_values().collect(),
        }
    }
}

fn render_key(join_values: &[Option<String>]) -> Vec<String> {
    join_values
        .iter()
        .map(|value| value.clone().unwrap_or_else(|| NULL_LITERAL.to_string()))
        .collect()
}
