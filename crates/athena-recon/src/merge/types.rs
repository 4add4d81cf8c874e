//! Result row types flowing from raw backend output to the final report.

use std::collections::HashMap;

use serde::Serialize;

use crate::codec;

/// One data row as fetched from a subset's execution, split positionally
/// but with the condensed field still encoded.
#[derive(Debug, Clone)]
pub struct RawResultRow {
    /// Join-column values in declared order, `None` for SQL NULL.
    pub join_values: Vec<Option<String>>,
    pub remarks: String,
    pub diff_field: String,
}

impl RawResultRow {
    /// Expand the condensed field into per-column value pairs.
    pub fn decode(self) -> DecodedRow {
        let diffs = codec::decode(&self.diff_field);
        DecodedRow {
            join_values: self.join_values,
            remarks: self.remarks,
            diffs,
        }
    }
}

/// A result row with the condensed field expanded. The mapping covers only
/// the compare columns of the subset that produced the row.
#[derive(Debug, Clone)]
pub struct DecodedRow {
    pub join_values: Vec<Option<String>>,
    pub remarks: String,
    pub diffs: HashMap<String, String>,
}

/// Identity of a merged row: join-column values plus classification.
///
/// The derived ordering is the report's canonical sort, join values in
/// declared order (NULL first) then remarks, so a sorted map of these keys
/// needs no separate sort step and no delimiter-joined key strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MergeKey {
    pub join_values: Vec<Option<String>>,
    pub remarks: String,
}

/// One row of the final report, covering the full compare-column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRow {
    pub join_values: Vec<Option<String>>,
    pub remarks: String,
    /// Value pairs aligned with the full compare-column list, empty where
    /// the column did not differ or the classification carries no values.
    pub values: Vec<String>,
}

/// The assembled reconciliation report.
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub join_columns: Vec<String>,
    pub compare_columns: Vec<String>,
    /// Rows in canonical order: join values (declared column order, NULL
    /// first), then remarks.
    pub rows: Vec<MergedRow>,
}

impl DiffReport {
    /// Output header: join columns, remarks, then one column per compare
    /// column.
    pub fn header(&self) -> Vec<String> {
        let mut header =
            Vec::with_capacity(self.join_columns.len() + 1 + self.compare_columns.len());
        header.extend(self.join_columns.iter().cloned());
        header.push(crate::core::REMARKS_FIELD.to_string());
        header.extend(self.compare_columns.iter().cloned());
        header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row counts per classification.
    pub fn counts(&self) -> RemarkCounts {
        let mut counts = RemarkCounts::default();
        for row in &self.rows {
            match row.remarks.as_str() {
                crate::core::REMARK_MISSING_IN_B => counts.missing_in_b += 1,
                crate::core::REMARK_MISSING_IN_A => counts.missing_in_a += 1,
                crate::core::REMARK_DUPLICATE_IN_A => counts.duplicate_in_a += 1,
                crate::core::REMARK_DUPLICATE_IN_B => counts.duplicate_in_b += 1,
                crate::core::REMARK_MATCHED => counts.matched_with_differences += 1,
                _ => counts.other += 1,
            }
        }
        counts
    }
}

/// Per-classification row counts for summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemarkCounts {
    pub missing_in_a: usize,
    pub missing_in_b: usize,
    pub duplicate_in_a: usize,
    pub duplicate_in_b: usize,
    pub matched_with_differences: usize,
    pub other: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_decode() {
        let raw = RawResultRow {
            join_values: vec![Some("1".to_string())],
            remarks: "matched".to_string(),
            diff_field: "px:10 X 12;qty:5 X 6".to_string(),
        };
        let decoded = raw.decode();
        assert_eq!(decoded.diffs.len(), 2);
        assert_eq!(decoded.diffs["px"], "10 X 12");
        assert_eq!(decoded.diffs["qty"], "5 X 6");
    }

    #[test]
    fn test_merge_key_ordering_null_first() {
        let null_key = MergeKey {
            join_values: vec![None],
            remarks: "matched".to_string(),
        };
        let value_key = MergeKey {
            join_values: vec![Some("1".to_string())],
            remarks: "matched".to_string(),
        };
        assert!(null_key < value_key);
    }

    #[test]
    fn test_merge_key_ordering_join_values_before_remarks() {
        let first = MergeKey {
            join_values: vec![Some("1".to_string())],
            remarks: "missing in B".to_string(),
        };
        let second = MergeKey {
            join_values: vec![Some("2".to_string())],
            remarks: "duplicate key in A".to_string(),
        };
        assert!(first < second);
    }

    #[test]
    fn test_report_header_shape() {
        let report = DiffReport {
            join_columns: vec!["trade_id".to_string(), "leg".to_string()],
            compare_columns: vec!["px".to_string(), "qty".to_string()],
            rows: vec![],
        };
        assert_eq!(report.header(), ["trade_id", "leg", "remarks", "px", "qty"]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_remark_counts() {
        let row = |remarks: &str| MergedRow {
            join_values: vec![Some("1".to_string())],
            remarks: remarks.to_string(),
            values: vec![String::new()],
        };
        let report = DiffReport {
            join_columns: vec!["id".to_string()],
            compare_columns: vec!["px".to_string()],
            rows: vec![
                row("matched"),
                row("matched"),
                row("missing in A"),
                row("duplicate key in B"),
            ],
        };
        let counts = report.counts();
        assert_eq!(counts.matched_with_differences, 2);
        assert_eq!(counts.missing_in_a, 1);
        assert_eq!(counts.duplicate_in_b, 1);
        assert_eq!(counts.missing_in_b, 0);
        assert_eq!(counts.other, 0);
    }
}
