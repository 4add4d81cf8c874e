//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::error::{ReconError, Result};

impl ReconConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ReconConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

/// Read a column-list file: one column name per line, trimmed. Blank lines
/// and lines starting with `#` are skipped.
pub fn columns_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(&path)?;
    let columns: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        return Err(ReconError::Config(format!(
            "Column list file {} contains no column names",
            path.as_ref().display()
        )));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = ReconConfig::from_yaml("{}").unwrap();
        assert_eq!(config.athena.workgroup, "primary");
        assert_eq!(config.run.size_ceiling_bytes, 262_144);
        assert_eq!(config.run.poll_interval_ms, 2_000);
        assert_eq!(config.run.max_poll_attempts, 150);
        assert_eq!(config.run.adjustment_suffix, "_adj");
        assert!(config.run.apply_adjustments);
    }

    #[test]
    fn test_from_yaml_overrides() {
        let yaml = r#"
athena:
  workgroup: recon
  output_location: s3://recon-results/athena/
run:
  size_ceiling_bytes: 65536
  apply_adjustments: false
"#;
        let config = ReconConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.athena.workgroup, "recon");
        assert_eq!(
            config.athena.output_location.as_deref(),
            Some("s3://recon-results/athena/")
        );
        assert_eq!(config.run.size_ceiling_bytes, 65536);
        assert!(!config.run.apply_adjustments);
        // Untouched fields keep defaults.
        assert_eq!(config.run.poll_interval_ms, 2_000);
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = "run:\n  poll_interval_ms: 0\n";
        assert!(ReconConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_columns_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# compare columns").unwrap();
        writeln!(file, "px").unwrap();
        writeln!(file, "  qty  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "venue").unwrap();
        file.flush().unwrap();

        let columns = columns_from_file(file.path()).unwrap();
        assert_eq!(columns, ["px", "qty", "venue"]);
    }

    #[test]
    fn test_columns_from_file_rejects_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# only comments").unwrap();
        file.flush().unwrap();

        let err = columns_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("no column names"));
    }

    #[test]
    fn test_columns_from_file_missing_path() {
        assert!(columns_from_file("/nonexistent/columns.txt").is_err());
    }
}
