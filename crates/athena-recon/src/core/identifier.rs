//! Identifier validation and quoting for generated Athena SQL.
//!
//! Table, database, and column names cannot be bound as query parameters -
//! they have to be spliced into the query text. Every name is validated once,
//! when the [`ComparisonSpec`](super::ComparisonSpec) is built; the compiler
//! then quotes already-validated names with the pure helpers here, which is
//! what keeps query compilation infallible.
//!
//! The opaque row-filter predicate is the one piece of user text that is
//! spliced unquoted, so it gets its own screening for statement-separator and
//! comment tricks.

use crate::error::{ReconError, Result};

/// Maximum identifier length. Glue/Athena caps table and column names at 255
/// characters; anything longer is garbage input.
const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ReconError::Comparison(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(ReconError::Comparison(format!(
            "Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ReconError::Comparison(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a Presto identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape a string for use inside a Presto single-quoted literal.
///
/// Used for the column-name prefixes baked into the condensed difference
/// field. The caller supplies the surrounding quotes.
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Qualify a table name with its database: `"database"."table"`.
pub fn qualify(database: &str, table: &str) -> String {
    format!("{}.{}", quote(database), quote(table))
}

/// Validate the opaque row-filter predicate.
///
/// The predicate is spliced verbatim into every filtered CTE, so it must be a
/// single boolean expression. Rejects statement separators and SQL comment
/// markers; anything else (functions, casts, date literals) is the query
/// engine's problem.
pub fn validate_predicate(predicate: &str) -> Result<()> {
    if predicate.trim().is_empty() {
        return Err(ReconError::Comparison(
            "Row filter predicate cannot be blank".to_string(),
        ));
    }

    if predicate.contains(';') {
        return Err(ReconError::Comparison(format!(
            "Row filter contains semicolon (possible injection): {:?}",
            predicate
        )));
    }

    if predicate.contains("--") || predicate.contains("/*") || predicate.contains("*/") {
        return Err(ReconError::Comparison(format!(
            "Row filter contains SQL comment markers (possible injection): {:?}",
            predicate
        )));
    }

    Ok(())
}
