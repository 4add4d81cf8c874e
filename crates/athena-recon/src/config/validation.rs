//! Configuration validation.

use super::ReconConfig;
use crate::error::{ReconError, Result};

/// Smallest usable size ceiling. The empty-skeleton comparison query is
/// already several hundred bytes, so anything under this is a typo.
const MIN_SIZE_CEILING: usize = 1024;

pub(crate) fn validate(config: &ReconConfig) -> Result<()> {
    if config.athena.workgroup.trim().is_empty() {
        return Err(ReconError::Config(
            "athena.workgroup cannot be empty".to_string(),
        ));
    }

    if let Some(location) = &config.athena.output_location {
        if !location.starts_with("s3://") {
            return Err(ReconError::Config(format!(
                "athena.output_location must be an s3:// URI, got {:?}",
                location
            )));
        }
    }

    if config.run.size_ceiling_bytes < MIN_SIZE_CEILING {
        return Err(ReconError::Config(format!(
            "run.size_ceiling_bytes must be at least {}, got {}",
            MIN_SIZE_CEILING, config.run.size_ceiling_bytes
        )));
    }

    if config.run.poll_interval_ms == 0 {
        return Err(ReconError::Config(
            "run.poll_interval_ms must be positive".to_string(),
        ));
    }

    if config.run.max_poll_attempts == 0 {
        return Err(ReconError::Config(
            "run.max_poll_attempts must be positive".to_string(),
        ));
    }

    if config.run.adjustment_suffix.is_empty() {
        return Err(ReconError::Config(
            "run.adjustment_suffix cannot be empty".to_string(),
        ));
    }

    Ok(())
}
