//! Core comparison types: table references, the comparison spec, and
//! contiguous compare-column subsets.

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::core::identifier::{qualify, validate_identifier, validate_predicate};
use crate::error::{ReconError, Result};

// ============================================================================
// Remarks vocabulary
// ============================================================================

/// Name of the classification column in query output and the final report.
pub const REMARKS_FIELD: &str = "remarks";

/// Row exists in table A but has no join-key match in table B.
pub const REMARK_MISSING_IN_B: &str = "missing in B";
/// Row exists in table B but has no join-key match in table A.
pub const REMARK_MISSING_IN_A: &str = "missing in A";
/// Join key appears more than once in table A.
pub const REMARK_DUPLICATE_IN_A: &str = "duplicate key in A";
/// Join key appears more than once in table B.
pub const REMARK_DUPLICATE_IN_B: &str = "duplicate key in B";
/// Join key matched exactly once on each side; compared columns may differ.
pub const REMARK_MATCHED: &str = "matched";

// ============================================================================
// Table references
// ============================================================================

/// A fully qualified Athena table: `database.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    /// Parse a `database.table` string, validating both parts.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(2, '.');
        let database = parts.next().unwrap_or_default();
        let table = match parts.next() {
            Some(t) => t,
            None => {
                return Err(ReconError::Comparison(format!(
                    "Table reference must be 'database.table', got {:?}",
                    raw
                )))
            }
        };
        if table.contains('.') {
            return Err(ReconError::Comparison(format!(
                "Table reference must have exactly one dot, got {:?}",
                raw
            )));
        }
        validate_identifier(database)?;
        validate_identifier(table)?;
        Ok(Self {
            database: database.to_string(),
            table: table.to_string(),
        })
    }

    /// The quoted form used in generated SQL: `"database"."table"`.
    pub fn qualified(&self) -> String {
        qualify(&self.database, &self.table)
    }

    /// Derive a sibling table in the same database by appending a suffix to
    /// the table name. Used for the default adjustment-table convention.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        let table = format!("{}{}", self.table, suffix);
        validate_identifier(&table)?;
        Ok(Self {
            database: self.database.clone(),
            table,
        })
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

// ============================================================================
// Comparison spec
// ============================================================================

/// Exclusion of already-adjusted keys from the comparison.
///
/// Keys present in the adjustment table (matched on the comparison's join
/// columns) are filtered out of both sides before any branch runs.
#[derive(Debug, Clone)]
pub struct AdjustmentConfig {
    pub table: TableRef,
}

/// Everything needed to reconcile one pair of tables.
///
/// Construction validates the column lists and optional row filter, so a
/// spec in hand is safe to compile queries from.
#[derive(Debug, Clone)]
pub struct ComparisonSpec {
    pub table_a: TableRef,
    pub table_b: TableRef,
    /// Columns that identify a row. Order is preserved in output.
    pub join_columns: Vec<String>,
    /// Columns whose values are compared. Order is preserved in output.
    pub compare_columns: Vec<String>,
    /// Optional boolean predicate applied to both tables before comparing.
    pub row_filter: Option<String>,
    /// Optional exclusion of keys already adjusted.
    pub adjustment: Option<AdjustmentConfig>,
}

impl ComparisonSpec {
    pub fn new(
        table_a: TableRef,
        table_b: TableRef,
        join_columns: Vec<String>,
        compare_columns: Vec<String>,
    ) -> Result<Self> {
        let spec = Self {
            table_a,
            table_b,
            join_columns,
            compare_columns,
            row_filter: None,
            adjustment: None,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Attach a row filter, validating it for injection hazards.
    pub fn with_row_filter(mut self, predicate: impl Into<String>) -> Result<Self> {
        let predicate = predicate.into();
        validate_predicate(&predicate)?;
        self.row_filter = Some(predicate);
        Ok(self)
    }

    /// Exclude keys present in the given adjustment table.
    pub fn with_adjustments(mut self, table: TableRef) -> Self {
        self.adjustment = Some(AdjustmentConfig { table });
        self
    }

    /// Validate column lists and the optional filter.
    ///
    /// Orchestration re-runs this before compiling in case a caller mutated
    /// the public fields after construction.
    pub fn validate(&self) -> Result<()> {
        if self.join_columns.is_empty() {
            return Err(ReconError::Comparison(
                "Join column list cannot be empty".to_string(),
            ));
        }
        if self.compare_columns.is_empty() {
            return Err(ReconError::Comparison(
                "Compare column list cannot be empty".to_string(),
            ));
        }

        let mut seen_join: HashSet<&str> = HashSet::new();
        for name in &self.join_columns {
            validate_identifier(name)?;
            if !seen_join.insert(name.as_str()) {
                return Err(ReconError::Comparison(format!(
                    "Duplicate join column: {:?}",
                    name
                )));
            }
        }

        let mut seen_compare: HashSet<&str> = HashSet::new();
        for name in &self.compare_columns {
            validate_identifier(name)?;
            if name.contains(':') || name.contains(';') {
                return Err(ReconError::Comparison(format!(
                    "Compare column {:?} contains ':' or ';', which collide with the \
                     difference-field encoding",
                    name
                )));
            }
            if !seen_compare.insert(name.as_str()) {
                return Err(ReconError::Comparison(format!(
                    "Duplicate compare column: {:?}",
                    name
                )));
            }
            if seen_join.contains(name.as_str()) {
                return Err(ReconError::Comparison(format!(
                    "Compare column {:?} is already a join column",
                    name
                )));
            }
        }

        if let Some(predicate) = &self.row_filter {
            validate_predicate(predicate)?;
        }

        Ok(())
    }
}

// ============================================================================
// Column subsets
// ============================================================================

/// A contiguous slice of the full compare-column list.
///
/// Subsets share the full list behind an `Arc`, so splitting never copies
/// column names. The range is always non-empty and in bounds.
#[derive(Debug, Clone)]
pub struct ColumnSubset {
    full: Arc<Vec<String>>,
    range: Range<usize>,
}

impl ColumnSubset {
    pub fn new(full: Arc<Vec<String>>, range: Range<usize>) -> Self {
        debug_assert!(!range.is_empty());
        debug_assert!(range.end <= full.len());
        Self { full, range }
    }

    /// A subset covering the entire compare-column list.
    pub fn whole(columns: Vec<String>) -> Self {
        let range = 0..columns.len();
        Self {
            full: Arc::new(columns),
            range,
        }
    }

    /// The columns this subset compares, in original list order.
    pub fn columns(&self) -> &[String] {
        &self.full[self.range.clone()]
    }

    /// The full compare-column list this subset was split from.
    pub fn full_list(&self) -> &[String] {
        &self.full
    }

    /// Shared handle to the full list, for deriving further subsets.
    pub fn full_arc(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.full)
    }

    /// Index range of this subset within the full list.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Short human label for logs: `first..last` or the lone column name.
    pub fn label(&self) -> String {
        let cols = self.columns();
        match cols {
            [only] => only.clone(),
            [first, .., last] => format!("{}..{}", first, last),
            [] => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> ComparisonSpec {
        ComparisonSpec::new(
            TableRef::parse("marketdata.trades").unwrap(),
            TableRef::parse("marketdata.trades_restated").unwrap(),
            vec!["trade_id".to_string(), "leg".to_string()],
            vec!["px".to_string(), "qty".to_string(), "venue".to_string()],
        )
        .unwrap()
    }

    // ========================================================================
    // TableRef
    // ========================================================================

    #[test]
    fn test_table_ref_parse() {
        let t = TableRef::parse("marketdata.trades").unwrap();
        assert_eq!(t.database, "marketdata");
        assert_eq!(t.table, "trades");
        assert_eq!(t.qualified(), "\"marketdata\".\"trades\"");
        assert_eq!(t.to_string(), "marketdata.trades");
    }

    #[test]
    fn test_table_ref_rejects_missing_database() {
        assert!(TableRef::parse("trades").is_err());
        assert!(TableRef::parse(".trades").is_err());
        assert!(TableRef::parse("marketdata.").is_err());
    }

    #[test]
    fn test_table_ref_rejects_extra_dots() {
        assert!(TableRef::parse("catalog.marketdata.trades").is_err());
    }

    #[test]
    fn test_table_ref_suffix() {
        let t = TableRef::parse("marketdata.trades").unwrap();
        let adj = t.with_suffix("_adj").unwrap();
        assert_eq!(adj.to_string(), "marketdata.trades_adj");
    }

    // ========================================================================
    // ComparisonSpec validation
    // ========================================================================

    #[test]
    fn test_spec_valid() {
        let spec = sample_spec();
        assert!(spec.validate().is_ok());
        assert!(spec.row_filter.is_none());
        assert!(spec.adjustment.is_none());
    }

    #[test]
    fn test_spec_rejects_empty_join_list() {
        let result = ComparisonSpec::new(
            TableRef::parse("a.x").unwrap(),
            TableRef::parse("a.y").unwrap(),
            vec![],
            vec!["px".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_spec_rejects_empty_compare_list() {
        let result = ComparisonSpec::new(
            TableRef::parse("a.x").unwrap(),
            TableRef::parse("a.y").unwrap(),
            vec!["id".to_string()],
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_spec_rejects_duplicate_join_column() {
        let result = ComparisonSpec::new(
            TableRef::parse("a.x").unwrap(),
            TableRef::parse("a.y").unwrap(),
            vec!["id".to_string(), "id".to_string()],
            vec!["px".to_string()],
        );
        assert!(result.unwrap_err().to_string().contains("Duplicate join"));
    }

    #[test]
    fn test_spec_rejects_compare_overlapping_join() {
        let result = ComparisonSpec::new(
            TableRef::parse("a.x").unwrap(),
            TableRef::parse("a.y").unwrap(),
            vec!["id".to_string()],
            vec!["id".to_string()],
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("already a join column"));
    }

    #[test]
    fn test_spec_rejects_codec_colliding_column_names() {
        for bad in ["px:usd", "px;eur"] {
            let result = ComparisonSpec::new(
                TableRef::parse("a.x").unwrap(),
                TableRef::parse("a.y").unwrap(),
                vec!["id".to_string()],
                vec![bad.to_string()],
            );
            assert!(result.is_err(), "expected rejection of {:?}", bad);
        }
    }

    #[test]
    fn test_spec_row_filter_validated() {
        let spec = sample_spec();
        assert!(spec
            .clone()
            .with_row_filter("as_of_date = DATE '2024-01-01'")
            .is_ok());
        assert!(spec.with_row_filter("1=1; DROP TABLE t").is_err());
    }

    // ========================================================================
    // ColumnSubset
    // ========================================================================

    #[test]
    fn test_subset_whole() {
        let subset = ColumnSubset::whole(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(subset.columns(), ["a", "b"]);
        assert_eq!(subset.full_list(), ["a", "b"]);
        assert_eq!(subset.range(), 0..2);
        assert_eq!(subset.len(), 2);
    }

    #[test]
    fn test_subset_shares_full_list() {
        let whole = ColumnSubset::whole(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let left = ColumnSubset::new(whole.full_arc(), 0..1);
        let right = ColumnSubset::new(whole.full_arc(), 1..3);
        assert_eq!(left.columns(), ["a"]);
        assert_eq!(right.columns(), ["b", "c"]);
        assert_eq!(right.full_list(), ["a", "b", "c"]);
    }

    #[test]
    fn test_subset_label() {
        let whole = ColumnSubset::whole(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(whole.label(), "a..c");
        let one = ColumnSubset::new(whole.full_arc(), 1..2);
        assert_eq!(one.label(), "b");
    }
}
