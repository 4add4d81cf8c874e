//! Query execution backend boundary.
//!
//! The [`QueryBackend`] trait defines the submit/poll/fetch/stop interface
//! the run loop drives. The production implementation is [`AthenaBackend`]
//! in `athena.rs`.
//!
//! # Design Pattern
//!
//! This uses the Strategy pattern to decouple query execution from the
//! orchestrator. The orchestrator works with `Arc<dyn QueryBackend>` without
//! knowing the concrete type, which is also what makes the run loop testable
//! with an in-memory backend.

pub mod athena;

use async_trait::async_trait;

use crate::error::Result;

pub use athena::AthenaBackend;

/// State of a submitted query as reported by the backend.
///
/// QUEUED and RUNNING both map to [`QueryStatus::Running`]; the run loop
/// only cares whether the query is still in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    Running,
    Succeeded,
    Failed(String),
    Cancelled(String),
}

/// Trait for query execution backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across async tasks.
///
/// # Example
///
/// ```rust,ignore
/// let backend: Arc<dyn QueryBackend> = Arc::new(AthenaBackend::connect(&config).await);
/// let execution_id = backend.submit(&compiled.text, "primary").await?;
/// ```
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Submit query text for execution in the given workgroup.
    ///
    /// Returns the backend's execution id for polling and retrieval.
    async fn submit(&self, query: &str, workgroup: &str) -> Result<String>;

    /// Report the current state of a submitted execution.
    async fn poll(&self, execution_id: &str) -> Result<QueryStatus>;

    /// Fetch all result rows of a succeeded execution, first row the header.
    ///
    /// Pagination is the implementation's concern; the returned vector holds
    /// every page. A cell is `None` where the engine returned SQL NULL.
    async fn fetch_rows(&self, execution_id: &str) -> Result<Vec<Vec<Option<String>>>>;

    /// Request cancellation of an in-flight execution.
    async fn stop(&self, execution_id: &str) -> Result<()>;

    /// Backend type name for logging/debugging.
    fn backend_type(&self) -> &'static str;
}
