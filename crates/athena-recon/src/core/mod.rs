//! Core types shared across the reconciliation pipeline.
//!
//! - [`compare`]: Table references, the comparison spec, compare-column subsets
//! - [`identifier`]: Identifier validation and Presto quoting
//!
//! Everything downstream (query compilation, bisection, merging) operates on
//! these types. Validation lives at spec construction so the later stages can
//! stay pure.

pub mod compare;
pub mod identifier;

// Re-export commonly used types for convenience
pub use compare::{
    AdjustmentConfig, ColumnSubset, ComparisonSpec, TableRef, REMARKS_FIELD,
    REMARK_DUPLICATE_IN_A, REMARK_DUPLICATE_IN_B, REMARK_MATCHED, REMARK_MISSING_IN_A,
    REMARK_MISSING_IN_B,
};
