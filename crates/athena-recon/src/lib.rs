//! # athena-recon
//!
//! Two-table reconciliation over AWS Athena.
//!
//! This library compares two relational tables sharing a key and reports
//! every row-level discrepancy, with support for:
//!
//! - **Five-way classification** of rows (missing either side, duplicate
//!   keys either side, matched with value differences)
//! - **Automatic bisection** of the compare-column list when the compiled
//!   SQL exceeds a configurable size ceiling
//! - **Deterministic merging** of partial result sets into a single report
//! - **Adjustment tables** for excluding known, accepted discrepancies
//! - **Pluggable backends** via the [`backend::QueryBackend`] trait, with
//!   Athena provided out of the box
//!
//! ## Example
//!
//! ```rust,no_run
//! use athena_recon::{ComparisonSpec, ReconConfig, ReconOrchestrator, TableRef};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> athena_recon::Result<()> {
//!     let config = ReconConfig::load("config.yaml")?;
//!     let spec = ComparisonSpec::new(
//!         TableRef::parse("sales.orders")?,
//!         TableRef::parse("sales.orders_v2")?,
//!         vec!["order_id".to_string()],
//!         vec!["price".to_string(), "qty".to_string()],
//!     )?;
//!     let orchestrator = ReconOrchestrator::new(config).await?;
//!     let outcome = orchestrator.run(&spec, CancellationToken::new()).await?;
//!     println!("{} rows differ", outcome.report.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod query;
pub mod report;

// Re-exports for convenient access
pub use config::{columns_from_file, AthenaConfig, ReconConfig, RunConfig};
pub use crate::core::{AdjustmentConfig, ColumnSubset, ComparisonSpec, TableRef};
pub use error::{ReconError, Result};
pub use merge::{DiffReport, MergedRow, RemarkCounts};
pub use orchestrator::{
    plan_subsets, ProgressEvent, ReconOrchestrator, ReconOutcome, RunSummary, SubsetPlan,
};
pub use query::CompiledQuery;
pub use report::{render_report, write_report};
