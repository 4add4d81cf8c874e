//! Reconciliation orchestrator - main workflow coordinator.
//!
//! Sequencing only: plan the compare-column subsets, execute each subset's
//! query through the backend, fold results into the merger, and assemble
//! the final report. The comparison logic itself lives in [`crate::query`]
//! and [`crate::merge`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{AthenaBackend, QueryBackend, QueryStatus};
use crate::config::ReconConfig;
use crate::core::{ColumnSubset, ComparisonSpec};
use crate::error::{ReconError, Result};
use crate::merge::{decode_rows, DecodedRow, DiffReport, RemarkCounts, ResultMerger};
use crate::query::{self, bisect};

/// Reconciliation orchestrator.
pub struct ReconOrchestrator {
    config: ReconConfig,
    backend: Arc<dyn QueryBackend>,
    progress: Option<mpsc::Sender<ProgressEvent>>,
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Bisection finished; the run will execute this many subset queries.
    Planned { subsets: usize },
    /// A subset query was submitted to the backend.
    SubsetSubmitted {
        index: usize,
        total: usize,
        execution_id: String,
    },
    /// A subset's results were downloaded and decoded.
    SubsetCompleted {
        index: usize,
        total: usize,
        rows: usize,
    },
}

/// One planned subset with its measured query size, for dry runs.
#[derive(Debug, Clone, Serialize)]
pub struct SubsetPlan {
    /// Short column-range label, `first..last`.
    pub label: String,
    /// Compare columns owned by this subset, in list order.
    pub columns: Vec<String>,
    /// Compiled query size in bytes.
    pub query_bytes: usize,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// Table A as `database.table`.
    pub table_a: String,

    /// Table B as `database.table`.
    pub table_b: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Number of subset queries executed.
    pub subsets_executed: usize,

    /// Rows in the final report.
    pub rows_reported: usize,

    /// Report rows per classification.
    pub counts: RemarkCounts,
}

/// A finished run: the report plus its summary.
#[derive(Debug, Clone)]
pub struct ReconOutcome {
    pub report: DiffReport,
    pub summary: RunSummary,
}

/// Plan the subset queries for a comparison without touching any backend.
///
/// This is the offline dry run behind `plan`: bisect under the configured
/// ceiling and measure each leaf's compiled query.
pub fn plan_subsets(spec: &ComparisonSpec, config: &ReconConfig) -> Result<Vec<SubsetPlan>> {
    spec.validate()?;
    let subsets = bisect::plan(spec, config.run.size_ceiling_bytes)?;
    Ok(subsets
        .iter()
        .map(|subset| SubsetPlan {
            label: subset.label(),
            columns: subset.columns().to_vec(),
            query_bytes: query::compile(spec, subset).bytes,
        })
        .collect())
}

impl ReconOrchestrator {
    /// Create an orchestrator backed by Athena.
    pub async fn new(config: ReconConfig) -> Result<Self> {
        config.validate()?;
        let backend = Arc::new(AthenaBackend::connect(&config.athena).await);
        Ok(Self {
            config,
            backend,
            progress: None,
        })
    }

    /// Create an orchestrator with a caller-supplied backend.
    pub fn with_backend(config: ReconConfig, backend: Arc<dyn QueryBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            progress: None,
        })
    }

    /// Attach a progress channel.
    pub fn with_progress(mut self, sender: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Run the reconciliation.
    pub async fn run(
        &self,
        spec: &ComparisonSpec,
        cancel: CancellationToken,
    ) -> Result<ReconOutcome> {
        spec.validate()?;

        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            table_a = %spec.table_a,
            table_b = %spec.table_b,
            join_columns = spec.join_columns.len(),
            compare_columns = spec.compare_columns.len(),
            backend = self.backend.backend_type(),
            "Starting reconciliation run"
        );

        // Phase 1: Plan compare-column subsets
        info!("Phase 1: Planning compare-column subsets");
        let subsets = bisect::plan(spec, self.config.run.size_ceiling_bytes)?;
        info!(
            subsets = subsets.len(),
            ceiling = self.config.run.size_ceiling_bytes,
            "Plan complete"
        );
        self.notify(ProgressEvent::Planned {
            subsets: subsets.len(),
        })
        .await;

        // Phase 2: Execute each subset and fold its results
        info!("Phase 2: Executing subset queries");
        let total = subsets.len();
        let mut merger =
            ResultMerger::new(spec.join_columns.clone(), spec.compare_columns.clone());
        for (index, subset) in subsets.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ReconError::Cancelled);
            }
            let rows = self
                .execute_subset(spec, subset, index, total, &cancel)
                .await?;
            merger.fold(subset, rows)?;
        }

        // Phase 3: Assemble the report
        info!("Phase 3: Merging subset results");
        let report = merger.finish();
        let counts = report.counts();

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        info!(
            rows = report.len(),
            duration_seconds, "Reconciliation run complete"
        );

        let summary = RunSummary {
            run_id,
            table_a: spec.table_a.to_string(),
            table_b: spec.table_b.to_string(),
            started_at,
            completed_at,
            duration_seconds,
            subsets_executed: total,
            rows_reported: report.len(),
            counts,
        };
        Ok(ReconOutcome { report, summary })
    }

    /// Submit a trivial probe query and wait for it, verifying connectivity,
    /// workgroup access, and result permissions.
    pub async fn health_check(&self) -> Result<()> {
        let execution_id = self
            .backend
            .submit("SELECT 1", &self.config.athena.workgroup)
            .await?;
        self.wait_for_completion(&execution_id, &CancellationToken::new())
            .await?;
        info!(
            backend = self.backend.backend_type(),
            workgroup = %self.config.athena.workgroup,
            "Health check passed"
        );
        Ok(())
    }

    async fn execute_subset(
        &self,
        spec: &ComparisonSpec,
        subset: &ColumnSubset,
        index: usize,
        total: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<DecodedRow>> {
        let compiled = query::compile(spec, subset);
        debug!(
            subset = %subset.label(),
            bytes = compiled.bytes,
            "Compiled subset query"
        );

        let execution_id = self
            .backend
            .submit(&compiled.text, &self.config.athena.workgroup)
            .await?;
        info!(
            subset = index + 1,
            total,
            execution_id = %execution_id,
            columns = subset.len(),
            "Submitted subset query"
        );
        self.notify(ProgressEvent::SubsetSubmitted {
            index,
            total,
            execution_id: execution_id.clone(),
        })
        .await;

        self.wait_for_completion(&execution_id, cancel).await?;

        let raw = self.backend.fetch_rows(&execution_id).await?;
        let rows = decode_rows(&spec.join_columns, raw, &execution_id)?;
        info!(
            subset = index + 1,
            total,
            rows = rows.len(),
            "Subset results downloaded"
        );
        self.notify(ProgressEvent::SubsetCompleted {
            index,
            total,
            rows: rows.len(),
        })
        .await;
        Ok(rows)
    }

    /// Poll until the execution reaches a terminal state, the attempt budget
    /// runs out, or cancellation is requested. Stops the remote query on
    /// timeout and cancellation.
    async fn wait_for_completion(
        &self,
        execution_id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let interval = Duration::from_millis(self.config.run.poll_interval_ms);
        for _ in 0..self.config.run.max_poll_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(execution_id, "Cancellation requested, stopping query");
                    self.backend.stop(execution_id).await?;
                    return Err(ReconError::Cancelled);
                }
                _ = tokio::time::sleep(interval) => {}
            }

            match self.backend.poll(execution_id).await? {
                QueryStatus::Running => continue,
                QueryStatus::Succeeded => return Ok(()),
                QueryStatus::Failed(reason) => {
                    return Err(ReconError::Execution {
                        execution_id: execution_id.to_string(),
                        state: "FAILED".to_string(),
                        reason,
                    })
                }
                QueryStatus::Cancelled(reason) => {
                    return Err(ReconError::Execution {
                        execution_id: execution_id.to_string(),
                        state: "CANCELLED".to_string(),
                        reason,
                    })
                }
            }
        }

        if let Err(error) = self.backend.stop(execution_id).await {
            warn!(execution_id, error = %error, "Failed to stop timed-out query");
        }
        Err(ReconError::Timeout {
            execution_id: execution_id.to_string(),
            attempts: self.config.run.max_poll_attempts,
        })
    }

    async fn notify(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TableRef;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted backend: the Nth submitted query gets the Nth script.
    struct MockBackend {
        scripts: Vec<Script>,
        submitted: Mutex<Vec<(String, String)>>,
        stopped: Mutex<Vec<String>>,
        poll_counts: Mutex<HashMap<String, u32>>,
    }

    #[derive(Clone)]
    struct Script {
        terminal: QueryStatus,
        polls_before_terminal: u32,
        rows: Vec<Vec<Option<String>>>,
    }

    impl MockBackend {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts,
                submitted: Mutex::new(Vec::new()),
                stopped: Mutex::new(Vec::new()),
                poll_counts: Mutex::new(HashMap::new()),
            }
        }

        fn succeed_with(rows: Vec<Vec<Option<String>>>) -> Script {
            Script {
                terminal: QueryStatus::Succeeded,
                polls_before_terminal: 0,
                rows,
            }
        }
    }

    #[async_trait]
    impl QueryBackend for MockBackend {
        async fn submit(&self, query: &str, workgroup: &str) -> Result<String> {
            let mut submitted = self.submitted.lock().unwrap();
            let id = format!("exec-{}", submitted.len());
            submitted.push((query.to_string(), workgroup.to_string()));
            Ok(id)
        }

        async fn poll(&self, execution_id: &str) -> Result<QueryStatus> {
            let index: usize = execution_id
                .trim_start_matches("exec-")
                .parse()
                .unwrap();
            let script = &self.scripts[index];
            let mut counts = self.poll_counts.lock().unwrap();
            let count = counts.entry(execution_id.to_string()).or_insert(0);
            *count += 1;
            if *count > script.polls_before_terminal {
                Ok(script.terminal.clone())
            } else {
                Ok(QueryStatus::Running)
            }
        }

        async fn fetch_rows(&self, execution_id: &str) -> Result<Vec<Vec<Option<String>>>> {
            let index: usize = execution_id
                .trim_start_matches("exec-")
                .parse()
                .unwrap();
            Ok(self.scripts[index].rows.clone())
        }

        async fn stop(&self, execution_id: &str) -> Result<()> {
            self.stopped.lock().unwrap().push(execution_id.to_string());
            Ok(())
        }

        fn backend_type(&self) -> &'static str {
            "mock"
        }
    }

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn header() -> Vec<Option<String>> {
        cells(&[Some("id"), Some("remarks"), Some("diff_details")])
    }

    fn test_config(ceiling: usize) -> ReconConfig {
        let mut config = ReconConfig::default();
        config.run.size_ceiling_bytes = ceiling;
        config.run.poll_interval_ms = 1;
        config.run.max_poll_attempts = 5;
        config
    }

    fn price_spec() -> ComparisonSpec {
        ComparisonSpec::new(
            TableRef::parse("sales.orders").unwrap(),
            TableRef::parse("sales.orders_v2").unwrap(),
            vec!["id".to_string()],
            vec!["price".to_string()],
        )
        .unwrap()
    }

    fn wide_spec() -> ComparisonSpec {
        ComparisonSpec::new(
            TableRef::parse("sales.orders").unwrap(),
            TableRef::parse("sales.orders_v2").unwrap(),
            vec!["id".to_string()],
            vec![
                "c1".to_string(),
                "c2".to_string(),
                "c3".to_string(),
                "c4".to_string(),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_single_subset_run_end_to_end() {
        let spec = price_spec();
        let backend = Arc::new(MockBackend::new(vec![MockBackend::succeed_with(vec![
            header(),
            cells(&[Some("1"), Some("matched"), Some("price:10 X 12")]),
        ])]));
        let orchestrator =
            ReconOrchestrator::with_backend(test_config(262_144), backend.clone()).unwrap();

        let outcome = orchestrator
            .run(&spec, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.summary.subsets_executed, 1);
        assert_eq!(outcome.report.len(), 1);
        let row = &outcome.report.rows[0];
        assert_eq!(row.join_values, cells(&[Some("1")]));
        assert_eq!(row.remarks, "matched");
        assert_eq!(row.values, vec!["10 X 12"]);
        assert_eq!(outcome.summary.counts.matched_with_differences, 1);

        let submitted = backend.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].0.contains("'matched'"));
        assert_eq!(submitted[0].1, "primary");
    }

    #[tokio::test]
    async fn test_split_run_merges_subset_results() {
        let spec = wide_spec();

        // Ceiling that admits every half but not the full list, so the plan
        // is exactly [c1..c2, c3..c4].
        let full = ColumnSubset::whole(spec.compare_columns.clone());
        let left = ColumnSubset::new(full.full_arc(), 0..2);
        let right = ColumnSubset::new(full.full_arc(), 2..4);
        let ceiling = query::compile(&spec, &left)
            .bytes
            .max(query::compile(&spec, &right).bytes);
        assert!(query::compile(&spec, &full).bytes > ceiling);

        let backend = Arc::new(MockBackend::new(vec![
            MockBackend::succeed_with(vec![
                header(),
                cells(&[Some("1"), Some("matched"), Some("c1:a X b")]),
                cells(&[Some("2"), Some("missing in B"), Some("")]),
            ]),
            MockBackend::succeed_with(vec![
                header(),
                cells(&[Some("1"), Some("matched"), Some("c3:c X d")]),
                cells(&[Some("2"), Some("missing in B"), Some("")]),
            ]),
        ]));
        let orchestrator =
            ReconOrchestrator::with_backend(test_config(ceiling), backend.clone()).unwrap();

        let outcome = orchestrator
            .run(&spec, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.summary.subsets_executed, 2);
        assert_eq!(outcome.report.len(), 2);
        assert_eq!(outcome.report.rows[0].values, vec!["a X b", "", "c X d", ""]);
        assert_eq!(outcome.report.rows[1].remarks, "missing in B");
        assert_eq!(backend.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_run() {
        let spec = price_spec();
        let backend = Arc::new(MockBackend::new(vec![Script {
            terminal: QueryStatus::Failed("SYNTAX_ERROR: line 1".to_string()),
            polls_before_terminal: 0,
            rows: vec![],
        }]));
        let orchestrator = ReconOrchestrator::with_backend(test_config(262_144), backend).unwrap();

        let err = orchestrator
            .run(&spec, CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ReconError::Execution { state, reason, .. } => {
                assert_eq!(state, "FAILED");
                assert!(reason.contains("SYNTAX_ERROR"));
            }
            other => panic!("expected Execution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_budget_exhaustion_times_out_and_stops_query() {
        let spec = price_spec();
        let backend = Arc::new(MockBackend::new(vec![Script {
            terminal: QueryStatus::Succeeded,
            polls_before_terminal: u32::MAX,
            rows: vec![],
        }]));
        let orchestrator =
            ReconOrchestrator::with_backend(test_config(262_144), backend.clone()).unwrap();

        let err = orchestrator
            .run(&spec, CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ReconError::Timeout { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(backend.stopped.lock().unwrap().as_slice(), ["exec-0"]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_is_cancelled_before_submitting() {
        let spec = price_spec();
        let backend = Arc::new(MockBackend::new(vec![]));
        let orchestrator =
            ReconOrchestrator::with_backend(test_config(262_144), backend.clone()).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orchestrator.run(&spec, cancel).await.unwrap_err();

        assert!(matches!(err, ReconError::Cancelled));
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inconsistent_subset_results_abort_run() {
        let spec = wide_spec();
        let full = ColumnSubset::whole(spec.compare_columns.clone());
        let left = ColumnSubset::new(full.full_arc(), 0..2);
        let right = ColumnSubset::new(full.full_arc(), 2..4);
        let ceiling = query::compile(&spec, &left)
            .bytes
            .max(query::compile(&spec, &right).bytes);

        // The two subset queries disagree about key 2's classification.
        let backend = Arc::new(MockBackend::new(vec![
            MockBackend::succeed_with(vec![
                header(),
                cells(&[Some("2"), Some("missing in B"), Some("")]),
            ]),
            MockBackend::succeed_with(vec![
                header(),
                cells(&[Some("2"), Some("missing in A"), Some("")]),
            ]),
        ]));
        let orchestrator = ReconOrchestrator::with_backend(test_config(ceiling), backend).unwrap();

        let err = orchestrator
            .run(&spec, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::MergeInconsistency { .. }));
    }

    #[tokio::test]
    async fn test_progress_events_in_order() {
        let spec = price_spec();
        let backend = Arc::new(MockBackend::new(vec![MockBackend::succeed_with(vec![
            header(),
        ])]));
        let (sender, mut receiver) = mpsc::channel(16);
        let orchestrator = ReconOrchestrator::with_backend(test_config(262_144), backend)
            .unwrap()
            .with_progress(sender);

        orchestrator
            .run(&spec, CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            receiver.recv().await,
            Some(ProgressEvent::Planned { subsets: 1 })
        ));
        assert!(matches!(
            receiver.recv().await,
            Some(ProgressEvent::SubsetSubmitted { index: 0, total: 1, .. })
        ));
        assert!(matches!(
            receiver.recv().await,
            Some(ProgressEvent::SubsetCompleted { index: 0, total: 1, rows: 0 })
        ));
    }

    #[tokio::test]
    async fn test_health_check_roundtrip() {
        let backend = Arc::new(MockBackend::new(vec![MockBackend::succeed_with(vec![])]));
        let orchestrator =
            ReconOrchestrator::with_backend(test_config(262_144), backend.clone()).unwrap();

        orchestrator.health_check().await.unwrap();
        let submitted = backend.submitted.lock().unwrap();
        assert_eq!(submitted[0].0, "SELECT 1");
    }

    #[test]
    fn test_plan_subsets_offline() {
        let spec = wide_spec();
        let plans = plan_subsets(&spec, &test_config(262_144)).unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].columns, ["c1", "c2", "c3", "c4"]);
        assert!(plans[0].query_bytes > 0);
    }

    #[test]
    fn test_plan_subsets_rejects_invalid_spec() {
        let mut spec = wide_spec();
        spec.compare_columns.clear();
        assert!(plan_subsets(&spec, &test_config(262_144)).is_err());
    }
}
