//! AWS Athena implementation of [`QueryBackend`].
//!
//! Thin wrapper over the Athena SDK: StartQueryExecution, GetQueryExecution,
//! paginated GetQueryResults, StopQueryExecution. All SDK errors are folded
//! into [`ReconError::Athena`] with the SDK's full error context preserved.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionState, ResultConfiguration};
use aws_sdk_athena::Client;
use tracing::debug;

use crate::backend::{QueryBackend, QueryStatus};
use crate::config::AthenaConfig;
use crate::error::{ReconError, Result};

/// Maximum rows per GetQueryResults page permitted by the API.
const RESULTS_PAGE_SIZE: i32 = 1000;

pub struct AthenaBackend {
    client: Client,
    output_location: Option<String>,
}

impl AthenaBackend {
    /// Build a backend from the ambient AWS credential chain.
    pub async fn connect(config: &AthenaConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;
        Self {
            client: Client::new(&sdk_config),
            output_location: config.output_location.clone(),
        }
    }

    /// Wrap an existing SDK client.
    pub fn from_client(client: Client, output_location: Option<String>) -> Self {
        Self {
            client,
            output_location,
        }
    }
}

#[async_trait]
impl QueryBackend for AthenaBackend {
    async fn submit(&self, query: &str, workgroup: &str) -> Result<String> {
        let mut request = self
            .client
            .start_query_execution()
            .query_string(query)
            .work_group(workgroup);
        if let Some(location) = &self.output_location {
            request = request.result_configuration(
                ResultConfiguration::builder()
                    .output_location(location)
                    .build(),
            );
        }

        let response = request.send().await.map_err(|e| {
            ReconError::athena(
                "start query execution",
                DisplayErrorContext(&e).to_string(),
            )
        })?;

        let execution_id = response.query_execution_id().ok_or_else(|| {
            ReconError::athena("start query execution", "response missing execution id")
        })?;
        debug!(execution_id, workgroup, "Submitted query");
        Ok(execution_id.to_string())
    }

    async fn poll(&self, execution_id: &str) -> Result<QueryStatus> {
        let response = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| {
                ReconError::athena("get query execution", DisplayErrorContext(&e).to_string())
            })?;

        let status = response
            .query_execution()
            .and_then(|execution| execution.status())
            .ok_or_else(|| {
                ReconError::athena("get query execution", "response missing execution status")
            })?;
        let state = status.state().ok_or_else(|| {
            ReconError::athena("get query execution", "response missing execution state")
        })?;
        let reason = || {
            status
                .state_change_reason()
                .unwrap_or("no reason reported")
                .to_string()
        };

        match state {
            QueryExecutionState::Queued | QueryExecutionState::Running => Ok(QueryStatus::Running),
            QueryExecutionState::Succeeded => Ok(QueryStatus::Succeeded),
            QueryExecutionState::Failed => Ok(QueryStatus::Failed(reason())),
            QueryExecutionState::Cancelled => Ok(QueryStatus::Cancelled(reason())),
            other => Err(ReconError::athena(
                "get query execution",
                format!("unrecognized execution state: {other:?}"),
            )),
        }
    }

    async fn fetch_rows(&self, execution_id: &str) -> Result<Vec<Vec<Option<String>>>> {
        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self
                .client
                .get_query_results()
                .query_execution_id(execution_id)
                .max_results(RESULTS_PAGE_SIZE);
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request.send().await.map_err(|e| {
                ReconError::athena("get query results", DisplayErrorContext(&e).to_string())
            })?;
            pages += 1;

            if let Some(result_set) = response.result_set() {
                for row in result_set.rows() {
                    rows.push(
                        row.data()
                            .iter()
                            .map(|datum| datum.var_char_value().map(str::to_string))
                            .collect(),
                    );
                }
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(execution_id, pages, rows = rows.len(), "Fetched result rows");
        Ok(rows)
    }

    async fn stop(&self, execution_id: &str) -> Result<()> {
        self.client
            .stop_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| {
                ReconError::athena("stop query execution", DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "athena"
    }
}
