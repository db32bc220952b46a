//! Run Report (C13): per-archive conversion statistics, optionally
//! serialized to JSON/CSV/HTML via `generate_report`'s format dispatch.

use crate::util::pct_change;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    Html,
}

impl ReportFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "html" => Some(Self::Html),
            _ => None,
        }
    }
}

/// Per-archive outcome folded into the run-wide report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    pub source_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub original_size: u64,
    pub compressed_size: u64,
    pub page_count: u64,
    pub bad_file_count: u64,
    pub aborted: bool,
    pub errors: Vec<String>,
    pub codec_counts: HashMap<String, u64>,
}

impl ArchiveOutcome {
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            self.compressed_size as f64 / self.original_size as f64
        }
    }

    pub fn pct_change(&self) -> String {
        pct_change(self.original_size as f64, self.compressed_size as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub archive_count: u64,
    pub aborted_count: u64,
    pub format_counts: HashMap<String, u64>,
    pub archives: Vec<ArchiveOutcome>,
}

impl RunReport {
    pub fn total_original_size(&self) -> u64 {
        self.archives.iter().map(|a| a.original_size).sum()
    }

    pub fn total_compressed_size(&self) -> u64 {
        self.archives.iter().map(|a| a.compressed_size).sum()
    }
}

/// Write `report` to a fixed filename in the current working directory,
/// dispatching on `format`.
pub fn generate_report(report: &RunReport, format: ReportFormat) -> Result<PathBuf> {
    match format {
        ReportFormat::Json => generate_json_report(report),
        ReportFormat::Csv => generate_csv_report(report),
        ReportFormat::Html => generate_html_report(report),
    }
}

fn generate_json_report(report: &RunReport) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;
    let path = PathBuf::from("recbz_report.json");
    std::fs::write(&path, json)?;
    Ok(path)
}

fn generate_csv_report(report: &RunReport) -> Result<PathBuf> {
    let path = PathBuf::from("recbz_report.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "source_path",
        "output_path",
        "original_size",
        "compressed_size",
        "compression_ratio",
        "pct_change",
        "page_count",
        "bad_file_count",
        "aborted",
    ])?;
    for archive in &report.archives {
        writer.write_record([
            archive.source_path.display().to_string(),
            archive
                .output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            archive.original_size.to_string(),
            archive.compressed_size.to_string(),
            format!("{:.4}", archive.compression_ratio()),
            archive.pct_change(),
            archive.page_count.to_string(),
            archive.bad_file_count.to_string(),
            archive.aborted.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}

fn generate_html_report(report: &RunReport) -> Result<PathBuf> {
    let rows: String = report
        .archives
        .iter()
        .map(|a| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{:.2}%</td><td>{}</td><td>{}</td></tr>",
                a.source_path.display(),
                a.output_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                a.compression_ratio() * 100.0,
                a.page_count,
                a.bad_file_count,
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>reCBZ Run Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; }}
        .header {{ color: #2c3e50; }}
        table {{ border-collapse: collapse; width: 100%; }}
        td, th {{ border: 1px solid #ccc; padding: 6px; text-align: left; }}
    </style>
</head>
<body>
    <h1 class="header">reCBZ Run Report</h1>
    <p>Archives processed: {} ({} aborted)</p>
    <p>Duration: {}s</p>
    <table>
        <tr><th>Source</th><th>Output</th><th>Ratio</th><th>Pages</th><th>Bad files</th></tr>
        {}
    </table>
</body>
</html>"#,
        report.archive_count,
        report.aborted_count,
        report.duration.as_secs(),
        rows,
    );

    let path = PathBuf::from("recbz_report.html");
    std::fs::write(&path, html)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_outcome() -> ArchiveOutcome {
        ArchiveOutcome {
            source_path: PathBuf::from("foo.cbz"),
            output_path: Some(PathBuf::from("foo [reCBZ].cbz")),
            original_size: 1000,
            compressed_size: 400,
            page_count: 20,
            bad_file_count: 0,
            aborted: false,
            errors: vec![],
            codec_counts: HashMap::new(),
        }
    }

    #[test]
    fn compression_ratio_is_compressed_over_original() {
        let outcome = sample_outcome();
        assert!((outcome.compression_ratio() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn compression_ratio_is_zero_for_empty_original() {
        let mut outcome = sample_outcome();
        outcome.original_size = 0;
        assert_eq!(outcome.compression_ratio(), 0.0);
    }

    #[test]
    fn pct_change_is_negative_for_shrinkage() {
        let outcome = sample_outcome();
        assert!(outcome.pct_change().starts_with('-'));
    }

    #[test]
    fn format_from_name_is_case_insensitive() {
        assert_eq!(ReportFormat::from_name("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_name("bogus"), None);
    }
}
