//! Report artifacts written after a run or an audit.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::engine::coverage::GapTally;
use crate::error::HarnessError;
use crate::parity::audit::{render_markdown, CoverageAudit};
use crate::parity::backlog::Backlog;
use crate::parity::compare::ComparisonRow;
use crate::parity::gate::GateEvaluation;
use crate::parity::summary::ParitySummary;
use crate::parity::tool::SyncReport;

pub const PARITY_REPORT_FILE: &str = "parity-report.json";
pub const PARITY_ROWS_FILE: &str = "parity-rows.csv";
pub const REFERENCE_SYNC_FILE: &str = "reference-sync.json";
pub const AUDIT_JSON_FILE: &str = "dogma-coverage-audit.json";
pub const AUDIT_MARKDOWN_FILE: &str = "dogma-coverage-audit.md";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityReport {
    pub summary: ParitySummary,
    pub gate: GateEvaluation,
    pub backlog: Backlog,
    pub rows: Vec<ComparisonRow>,
    /// Already ranked into `summary.coverageGaps`; kept for the audit merge.
    #[serde(skip)]
    pub gaps: GapTally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
    pub cancelled_fits: usize,
}

impl ParityReport {
    pub fn passed(&self) -> bool {
        self.gate.pass && self.cancelled_fits == 0
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CsvDeltaRow<'a> {
    fit_id: &'a str,
    ship_type_id: u32,
    metric: String,
    actual: f64,
    expected: f64,
    abs_delta: f64,
    rel_delta: f64,
    pass: bool,
}

fn ensure_dir(dir: &Path) -> Result<(), HarnessError> {
    fs::create_dir_all(dir).map_err(|err| HarnessError::io(dir, err))
}

/// Pretty JSON with a trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), HarnessError> {
    let mut payload =
        serde_json::to_string_pretty(value).map_err(|err| HarnessError::json(path, 0, err))?;
    payload.push('\n');
    fs::write(path, payload).map_err(|err| HarnessError::io(path, err))
}

/// One CSV line per metric delta.
pub fn write_rows_csv(path: &Path, rows: &[ComparisonRow]) -> Result<(), HarnessError> {
    let csv_error = |source| HarnessError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for row in rows {
        for delta in &row.deltas {
            writer
                .serialize(CsvDeltaRow {
                    fit_id: &row.fit_id,
                    ship_type_id: row.ship_type_id,
                    metric: delta.metric.to_string(),
                    actual: delta.actual,
                    expected: delta.expected,
                    abs_delta: delta.abs_delta,
                    rel_delta: delta.rel_delta,
                    pass: delta.pass,
                })
                .map_err(csv_error)?;
        }
    }
    writer
        .flush()
        .map_err(|err| HarnessError::io(path, err))
}

pub fn write_parity_reports(dir: &Path, report: &ParityReport) -> Result<Vec<PathBuf>, HarnessError> {
    ensure_dir(dir)?;
    let mut written = vec![dir.join(PARITY_REPORT_FILE), dir.join(PARITY_ROWS_FILE)];
    write_json(&written[0], report)?;
    write_rows_csv(&written[1], &report.rows)?;
    if let Some(sync) = &report.sync {
        let path = dir.join(REFERENCE_SYNC_FILE);
        write_json(&path, sync)?;
        written.push(path);
    }
    info!(dir = %dir.display(), files = written.len(), "wrote parity reports");
    Ok(written)
}

pub fn write_audit_reports(dir: &Path, audit: &CoverageAudit) -> Result<Vec<PathBuf>, HarnessError> {
    ensure_dir(dir)?;
    let json_path = dir.join(AUDIT_JSON_FILE);
    let markdown_path = dir.join(AUDIT_MARKDOWN_FILE);
    write_json(&json_path, audit)?;
    fs::write(&markdown_path, render_markdown(audit))
        .map_err(|err| HarnessError::io(&markdown_path, err))?;
    info!(dir = %dir.display(), "wrote coverage audit");
    Ok(vec![json_path, markdown_path])
}
