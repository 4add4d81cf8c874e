//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconConfig {
    /// Athena connection settings.
    #[serde(default)]
    pub athena: AthenaConfig,

    /// Run behavior settings.
    #[serde(default)]
    pub run: RunConfig,
}

/// Athena connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthenaConfig {
    /// Workgroup queries run in (default: "primary").
    #[serde(default = "default_workgroup")]
    pub workgroup: String,

    /// S3 location for query results. Optional when the workgroup enforces
    /// its own output location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,

    /// AWS region override. Falls back to the ambient AWS configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Default for AthenaConfig {
    fn default() -> Self {
        Self {
            workgroup: default_workgroup(),
            output_location: None,
            region: None,
        }
    }
}

/// Run behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum compiled query size in bytes before the compare-column list
    /// is split (default: 262144, Athena's query string limit).
    #[serde(default = "default_size_ceiling")]
    pub size_ceiling_bytes: usize,

    /// Milliseconds between execution status polls (default: 2000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum status polls per execution before the run times out
    /// (default: 150, five minutes at the default interval).
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Suffix appended to table A's name to locate the adjustment table
    /// (default: "_adj").
    #[serde(default = "default_adjustment_suffix")]
    pub adjustment_suffix: String,

    /// Whether keys present in the adjustment table are excluded from the
    /// comparison (default: true).
    #[serde(default = "default_true")]
    pub apply_adjustments: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size_ceiling_bytes: default_size_ceiling(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            adjustment_suffix: default_adjustment_suffix(),
            apply_adjustments: default_true(),
        }
    }
}

fn default_workgroup() -> String {
    "primary".to_string()
}

fn default_size_ceiling() -> usize {
    262_144
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_poll_attempts() -> u32 {
    150
}

fn default_adjustment_suffix() -> String {
    "_adj".to_string()
}

fn default_true() -> bool {
    true
}
