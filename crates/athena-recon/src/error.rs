//! Error types for the reconciliation library.

use thiserror::Error;

/// Main error type for reconciliation operations.
#[derive(Error, Debug)]
pub enum ReconError {
    /// Configuration error (invalid YAML, bad settings values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed comparison input (column lists, table identifiers, filter)
    #[error("Comparison error: {0}")]
    Comparison(String),

    /// A single-column query still exceeds the size ceiling and cannot be
    /// split any further
    #[error(
        "Query for compare column '{column}' is {bytes} bytes, over the {ceiling}-byte ceiling, \
         and a one-column query cannot be split further"
    )]
    SizeExceeded {
        column: String,
        bytes: usize,
        ceiling: usize,
    },

    /// Athena API request failed (submit, poll, fetch, stop)
    #[error("Athena request failed: {message}\n  Context: {context}")]
    Athena { message: String, context: String },

    /// A submitted query reached a FAILED or CANCELLED terminal state
    #[error("Query execution {execution_id} finished {state}: {reason}")]
    Execution {
        execution_id: String,
        state: String,
        reason: String,
    },

    /// Polling exhausted the maximum attempt count
    #[error("Query execution {execution_id} still running after {attempts} polls - giving up")]
    Timeout { execution_id: String, attempts: u32 },

    /// The backend returned rows that do not match the compiled query shape
    #[error("Malformed result set for execution {execution_id}: {message}")]
    Results {
        execution_id: String,
        message: String,
    },

    /// Two subset result sets disagree on rows that must be identical
    #[error("Subset results disagree for key {key:?}: {detail}")]
    MergeInconsistency { key: Vec<String>, detail: String },

    /// Report serialization error
    #[error("Report error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl ReconError {
    /// Create an Athena error with context about the failed operation.
    pub fn athena(message: impl Into<String>, context: impl Into<String>) -> Self {
        ReconError::Athena {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Results error for a malformed result set.
    pub fn results(execution_id: impl Into<String>, message: impl Into<String>) -> Self {
        ReconError::Results {
            execution_id: execution_id.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error.
    ///
    /// Stable mapping so schedulers (Airflow, cron wrappers) can branch on
    /// the failure class without parsing stderr.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconError::Config(_) => 1,
            ReconError::Comparison(_) => 2,
            ReconError::SizeExceeded { .. } => 3,
            ReconError::Athena { .. } => 4,
            ReconError::Execution { .. } => 5,
            ReconError::Timeout { .. } => 6,
            ReconError::Results { .. } => 7,
            ReconError::MergeInconsistency { .. } => 8,
            ReconError::Csv(_) => 9,
            ReconError::Io(_) => 10,
            ReconError::Yaml(_) => 1,
            ReconError::Json(_) => 1,
            ReconError::Cancelled => 130,
        }
    }
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_exceeded_names_column() {
        let err = ReconError::SizeExceeded {
            column: "trade_px".to_string(),
            bytes: 300_000,
            ceiling: 262_144,
        };
        let msg = err.to_string();
        assert!(msg.contains("trade_px"));
        assert!(msg.contains("300000"));
        assert!(msg.contains("262144"));
    }

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let errs = [
            ReconError::Config("x".into()),
            ReconError::Comparison("x".into()),
            ReconError::SizeExceeded {
                column: "c".into(),
                bytes: 1,
                ceiling: 1,
            },
            ReconError::athena("m", "c"),
            ReconError::Execution {
                execution_id: "e".into(),
                state: "FAILED".into(),
                reason: "r".into(),
            },
            ReconError::Timeout {
                execution_id: "e".into(),
                attempts: 3,
            },
            ReconError::results("e", "m"),
            ReconError::MergeInconsistency {
                key: vec!["k".into()],
                detail: "d".into(),
            },
        ];
        let codes: Vec<u8> = errs.iter().map(|e| e.exit_code()).collect();
        let mut deduped = codes.clone();
        deduped.dedup();
        assert_eq!(codes, deduped);
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn test_format_detailed_includes_io_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "join_cols.txt");
        let err = ReconError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
        assert!(detailed.contains("join_cols.txt"));
    }
}
