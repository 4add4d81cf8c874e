//! Encoding contract for the condensed per-row difference field.
//!
//! Matched rows carry all their column differences in one string column so
//! the comparison query can stay a single SELECT regardless of how many
//! columns are compared. The wire format is
//!
//! ```text
//! col1:valueA X valueB;col2:valueA X valueB
//! ```
//!
//! one entry per differing column, in compare-list order, `NULL` standing in
//! for SQL NULL on either side. The query builder emits this format from SQL
//! (see [`compile`](crate::query::compile)); [`decode`] is its inverse on the
//! client.
//!
//! There is no escaping. Column names containing `:` or `;` are rejected
//! when the comparison is built; values containing the separators would
//! mis-split and are a known limit of the format.

use std::collections::HashMap;

use tracing::warn;

/// Name of the condensed difference column in query output and result rows.
pub const DIFF_FIELD: &str = "diff_details";

/// Separator between per-column entries.
pub const ENTRY_SEPARATOR: &str = ";";

/// Separator between the table-A value and the table-B value inside an entry.
pub const PAIR_SEPARATOR: &str = " X ";

/// Literal standing in for SQL NULL on either side of a pair.
pub const NULL_LITERAL: &str = "NULL";

/// Encode an ordered list of (column, value-pair) differences into the
/// condensed field format.
///
/// The query engine builds this same encoding server-side; this function
/// mirrors it for round-trip tests and fixture construction.
pub fn encode(diffs: &[(String, String)]) -> String {
    diffs
        .iter()
        .map(|(column, pair)| format!("{}:{}", column, pair))
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// Format one value pair the way the query engine does: `valueA X valueB`,
/// with `NULL` for absent values.
pub fn format_pair(value_a: Option<&str>, value_b: Option<&str>) -> String {
    format!(
        "{}{}{}",
        value_a.unwrap_or(NULL_LITERAL),
        PAIR_SEPARATOR,
        value_b.unwrap_or(NULL_LITERAL)
    )
}

/// Decode a condensed difference field into a map from column name to
/// value pair.
///
/// Entries are split on `;` and trimmed; empty entries are ignored. Each
/// entry splits at its FIRST colon so value pairs may contain colons
/// (timestamps). An entry with no colon is malformed: it is skipped with a
/// warning rather than failing the row.
pub fn decode(condensed: &str) -> HashMap<String, String> {
    let mut diffs = HashMap::new();
    for entry in condensed.split(ENTRY_SEPARATOR) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((column, pair)) => {
                diffs.insert(column.to_string(), pair.to_string());
            }
            None => {
                warn!(entry = %entry, "Skipping malformed difference entry (no colon)");
            }
        }
    }
    diffs
}
