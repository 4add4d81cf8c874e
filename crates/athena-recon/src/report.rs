//! CSV rendering of the final report.
//!
//! Header is `[join columns..., remarks, compare columns...]`, one column
//! per original compare column. Compare cells hold either the empty string
//! or a `valueA X valueB` pair; NULL join values render as empty cells.
//! Quoting is the csv crate's standard behavior (embedded quotes doubled).

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::merge::DiffReport;

/// Write the report as CSV to a file.
pub fn write_report<P: AsRef<Path>>(report: &DiffReport, path: P) -> Result<()> {
    let file = std::fs::File::create(&path)?;
    write_report_to(report, file)?;
    info!(
        path = %path.as_ref().display(),
        rows = report.len(),
        "Report written"
    );
    Ok(())
}

/// Write the report as CSV to any writer.
pub fn write_report_to<W: Write>(report: &DiffReport, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(report.header())?;
    for row in &report.rows {
        let mut record: Vec<&str> =
            Vec::with_capacity(row.join_values.len() + 1 + row.values.len());
        for value in &row.join_values {
            record.push(value.as_deref().unwrap_or(""));
        }
        record.push(row.remarks.as_str());
        for value in &row.values {
            record.push(value.as_str());
        }
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render the report as a CSV string, for stdout output.
pub fn render_report(report: &DiffReport) -> Result<String> {
    let mut buffer: Vec<u8> = Vec::new();
    write_report_to(report, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergedRow;

    fn sample_report() -> DiffReport {
        DiffReport {
            join_columns: vec!["trade_id".to_string()],
            compare_columns: vec!["px".to_string(), "venue".to_string()],
            rows: vec![
                MergedRow {
                    join_values: vec![None],
                    remarks: "missing in A".to_string(),
                    values: vec![String::new(), String::new()],
                },
                MergedRow {
                    join_values: vec![Some("42".to_string())],
                    remarks: "matched".to_string(),
                    values: vec!["10 X 12".to_string(), String::new()],
                },
            ],
        }
    }

    #[test]
    fn test_render_header_and_rows() {
        let rendered = render_report(&sample_report()).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "trade_id,remarks,px,venue");
        assert_eq!(lines[1], ",missing in A,,");
        assert_eq!(lines[2], "42,matched,10 X 12,");
    }

    #[test]
    fn test_values_with_delimiters_are_quoted() {
        let report = DiffReport {
            join_columns: vec!["id".to_string()],
            compare_columns: vec!["note".to_string()],
            rows: vec![MergedRow {
                join_values: vec![Some("1".to_string())],
                remarks: "matched".to_string(),
                values: vec!["a,b X say \"hi\"".to_string()],
            }],
        };
        let rendered = render_report(&report).unwrap();

        assert!(rendered.contains("\"a,b X say \"\"hi\"\"\""));
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_report(&sample_report(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("trade_id,remarks,px,venue"));
        assert_eq!(content.lines().count(), 3);
    }
}
