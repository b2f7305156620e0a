//! External reference calculator: an opaque async task with a timeout.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::data::pack::TypeId;
use crate::engine::metrics::{MetricResult, MetricSource};
use crate::error::{HarnessError, ReferenceToolError};
use crate::parallel::CancellationFlag;
use crate::parity::corpus::fingerprint;
use crate::parity::reference::{ReferenceLookup, ReferenceRevision, ReferenceStore};

const STDERR_TAIL_LINES: usize = 8;
const STDERR_TAIL_CHARS: usize = 2_000;

/// What the reference tool is asked to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRequest {
    pub fit_id: String,
    pub ship_type_id: TypeId,
    pub eft: String,
    pub sde_version: String,
}

#[async_trait]
pub trait ReferenceTool: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, request: &ReferenceRequest)
        -> Result<MetricResult, ReferenceToolError>;
}

/// Runs a configured program per fit: EFT on stdin, one JSON Metric Result on stdout.
#[derive(Debug, Clone)]
pub struct CommandReferenceTool {
    program: String,
    args: Vec<String>,
}

impl CommandReferenceTool {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
    let skip = tail.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    tail.chars().skip(skip).collect()
}

/// Parse tool output, filling identity fields the tool may omit from the request.
pub fn parse_reference_output(
    stdout: &[u8],
    request: &ReferenceRequest,
) -> Result<MetricResult, ReferenceToolError> {
    let mut revision: ReferenceRevision = serde_json::from_slice(stdout)
        .map_err(|err| ReferenceToolError::Parse(err.to_string()))?;
    revision.fit_id = request.fit_id.clone();
    revision.ship_type_id.get_or_insert(request.ship_type_id);
    revision
        .sde_version
        .get_or_insert_with(|| request.sde_version.clone());
    revision.source = Some(MetricSource::Reference);
    revision
        .rounded()
        .to_result()
        .ok_or_else(|| ReferenceToolError::Parse("output is missing metric fields".to_string()))
}

#[async_trait]
impl ReferenceTool for CommandReferenceTool {
    fn name(&self) -> &str {
        &self.program
    }

    async fn evaluate(
        &self,
        request: &ReferenceRequest,
    ) -> Result<MetricResult, ReferenceToolError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("DOGMA_PARITY_FIT_ID", &request.fit_id)
            .env("DOGMA_PARITY_SDE_VERSION", &request.sde_version)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ReferenceToolError::Spawn(err.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.eft.as_bytes())
                .await
                .map_err(|err| ReferenceToolError::Spawn(err.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| ReferenceToolError::Spawn(err.to_string()))?;
        if !output.status.success() {
            return Err(ReferenceToolError::Exit {
                status: output.status.code().unwrap_or(-1),
                stderr_tail: stderr_tail(&output.stderr),
            });
        }
        parse_reference_output(&output.stdout, request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_millis(60_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAdded {
    pub fit_id: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSkipped {
    pub fit_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub fit_id: String,
    pub reason: String,
    pub stage: String,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
    pub normalized_eft_hash: String,
}

/// Outcome of one reference sync, written to `reference-sync.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub tool: String,
    pub added: Vec<SyncAdded>,
    pub skipped: Vec<SyncSkipped>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn failed_fit_ids(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|failure| failure.fit_id.as_str())
    }
}

enum Outcome {
    Cancelled,
    Done(Result<MetricResult, ReferenceToolError>),
}

/// Ask `tool` for every request without a current reference, bounded by
/// `options`, and append the successes to `store`. Tool failures are reported,
/// never returned as errors.
pub async fn fetch_references(
    tool: &dyn ReferenceTool,
    requests: Vec<ReferenceRequest>,
    store: &mut ReferenceStore,
    options: FetchOptions,
    cancel: &CancellationFlag,
) -> Result<SyncReport, HarnessError> {
    let mut report = SyncReport {
        tool: tool.name().to_string(),
        ..SyncReport::default()
    };

    let mut pending = Vec::new();
    for request in requests {
        match store.lookup(&request.fit_id, &request.sde_version, true) {
            ReferenceLookup::Found(_) => report.skipped.push(SyncSkipped {
                fit_id: request.fit_id,
                reason: "already_present".to_string(),
            }),
            _ => pending.push(request),
        }
    }
    info!(
        tool = tool.name(),
        pending = pending.len(),
        skipped = report.skipped.len(),
        concurrency = options.concurrency,
        "fetching references"
    );

    let timeout_ms = u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX);
    let mut outcomes: Vec<(ReferenceRequest, Outcome, u64)> = stream::iter(pending)
        .map(|request| async move {
            if cancel.is_cancelled() {
                return (request, Outcome::Cancelled, 0);
            }
            let started = Instant::now();
            let result = match tokio::time::timeout(options.timeout, tool.evaluate(&request)).await
            {
                Ok(result) => result,
                Err(_) => Err(ReferenceToolError::Timeout(timeout_ms)),
            };
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            (request, Outcome::Done(result), elapsed_ms)
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;
    outcomes.sort_by(|left, right| left.0.fit_id.cmp(&right.0.fit_id));

    for (request, outcome, elapsed_ms) in outcomes {
        match outcome {
            Outcome::Cancelled => {
                debug!(fit_id = %request.fit_id, "reference fetch cancelled");
                report.skipped.push(SyncSkipped {
                    fit_id: request.fit_id,
                    reason: "cancelled".to_string(),
                });
            }
            Outcome::Done(Ok(result)) => {
                let mut revision = ReferenceRevision::from_result(&result, "reference-tool");
                revision.imported_at = Some(chrono::Utc::now().to_rfc3339());
                store.append(revision)?;
                report.added.push(SyncAdded {
                    fit_id: request.fit_id,
                    elapsed_ms,
                });
            }
            Outcome::Done(Err(err)) => {
                let stderr_tail = match &err {
                    ReferenceToolError::Exit { stderr_tail, .. } => Some(stderr_tail.clone()),
                    _ => None,
                };
                warn!(
                    fit_id = %request.fit_id,
                    stage = err.stage(),
                    elapsed_ms,
                    stderr_tail = stderr_tail.as_deref().unwrap_or(""),
                    "reference tool failed: {err}"
                );
                report.failed.push(SyncFailure {
                    reason: err.to_string(),
                    stage: err.stage().to_string(),
                    elapsed_ms,
                    stderr_tail,
                    normalized_eft_hash: fingerprint(&request.eft),
                    fit_id: request.fit_id,
                });
            }
        }
    }
    report.skipped.sort_by(|left, right| left.fit_id.cmp(&right.fit_id));

    info!(
        added = report.added.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "reference sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ReferenceRequest {
        ReferenceRequest {
            fit_id: "fit-1".to_string(),
            ship_type_id: 587,
            eft: "[Rifter, Test]".to_string(),
            sde_version: "sde-1".to_string(),
        }
    }

    const OUTPUT: &str = r#"{
        "dpsTotal": 101.23456, "alpha": 300, "ehp": 4000,
        "resists": {
            "shield": {"em": 0, "therm": 0.2, "kin": 0.4, "exp": 0.5},
            "armor": {"em": 0.5, "therm": 0.35, "kin": 0.25, "exp": 0.1},
            "hull": {"em": 0.33, "therm": 0.33, "kin": 0.33, "exp": 0.33}
        }
    }"#;

    #[test]
    fn parse_fills_identity_from_request() {
        let result = parse_reference_output(OUTPUT.as_bytes(), &request()).expect("parse");
        assert_eq!(result.fit_id, "fit-1");
        assert_eq!(result.ship_type_id, 587);
        assert_eq!(result.sde_version, "sde-1");
        assert_eq!(result.source, MetricSource::Reference);
        assert_eq!(result.dps_total, 101.2346);
    }

    #[test]
    fn parse_rejects_incomplete_output() {
        let err = parse_reference_output(br#"{"dpsTotal": 1}"#, &request()).unwrap_err();
        assert_eq!(err.stage(), "parse");
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr: String = (0..20).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 12"));
        assert!(tail.ends_with("line 19"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_tool_reports_non_zero_exit() {
        let tool = CommandReferenceTool::new(
            "sh",
            vec!["-c".to_string(), "cat >/dev/null; echo boom >&2; exit 3".to_string()],
        );
        let err = tool.evaluate(&request()).await.unwrap_err();
        assert_eq!(
            err,
            ReferenceToolError::Exit {
                status: 3,
                stderr_tail: "boom".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_tool_reads_stdout_json() {
        let script = format!("cat >/dev/null; printf '%s' '{}'", OUTPUT.replace('\n', " "));
        let tool = CommandReferenceTool::new("sh", vec!["-c".to_string(), script]);
        let result = tool.evaluate(&request()).await.expect("evaluate");
        assert_eq!(result.alpha, 300.0);
    }
}
