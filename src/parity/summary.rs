//! Run summary: counts, missing references, per-fit and per-hull rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::pack::TypeId;
use crate::engine::coverage::{GapCount, GapTally};
use crate::parity::compare::{ComparisonRow, MetricDelta, ThresholdPolicy};

/// Why a corpus fit has no comparable reference. Never a comparison failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingReason {
    Missing,
    Stale,
    ToolFailed,
    RejectedFit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingReference {
    pub fit_id: String,
    pub ship_type_id: TypeId,
    pub reason: MissingReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub golden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitSummaryRow {
    pub fit_id: String,
    pub ship_type_id: TypeId,
    pub pass: bool,
    pub max_rel_delta: f64,
    pub failing_metrics: Vec<MetricDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HullCounts {
    pub ship_type_id: TypeId,
    pub compared_fits: usize,
    pub passing_fits: usize,
    pub failing_fits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub fit_id: String,
    pub ship_type_id: TypeId,
    #[serde(flatten)]
    pub delta: MetricDelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLimits {
    pub top_mismatches: usize,
    pub failing_metrics_per_fit: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            top_mismatches: 50,
            failing_metrics_per_fit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParitySummary {
    pub generated_at: String,
    pub sde_version: String,
    pub threshold_policy: ThresholdPolicy,
    pub compared_fits: usize,
    pub passing_fits: usize,
    pub failing_fits: usize,
    pub golden_fits: usize,
    pub missing_golden_references: usize,
    pub missing_references: Vec<MissingReference>,
    pub per_fit: Vec<FitSummaryRow>,
    pub per_hull: Vec<HullCounts>,
    pub top_mismatches: Vec<Mismatch>,
    pub coverage_gaps: Vec<GapCount>,
}

/// Larger relative delta first, then larger absolute delta, then metric name.
fn mismatch_order(left: &MetricDelta, right: &MetricDelta) -> std::cmp::Ordering {
    right
        .rel_delta
        .total_cmp(&left.rel_delta)
        .then_with(|| right.abs_delta.total_cmp(&left.abs_delta))
        .then_with(|| left.metric.to_string().cmp(&right.metric.to_string()))
}

fn summarize_fit(row: &ComparisonRow, limit: usize) -> FitSummaryRow {
    let mut failing: Vec<MetricDelta> = row.failing().cloned().collect();
    failing.sort_by(mismatch_order);
    failing.truncate(limit);
    FitSummaryRow {
        fit_id: row.fit_id.clone(),
        ship_type_id: row.ship_type_id,
        pass: row.pass,
        max_rel_delta: row.max_rel_delta(),
        failing_metrics: failing,
    }
}

pub struct SummaryInput<'a> {
    pub rows: &'a [ComparisonRow],
    pub missing: Vec<MissingReference>,
    pub golden_ids: Option<&'a BTreeSet<String>>,
    pub gaps: &'a GapTally,
    pub policy: &'a ThresholdPolicy,
    pub sde_version: &'a str,
    pub generated_at: String,
}

pub fn build_summary(input: SummaryInput<'_>, limits: SummaryLimits) -> ParitySummary {
    let SummaryInput {
        rows,
        mut missing,
        golden_ids,
        gaps,
        policy,
        sde_version,
        generated_at,
    } = input;

    let mut per_fit: Vec<FitSummaryRow> = rows
        .iter()
        .map(|row| summarize_fit(row, limits.failing_metrics_per_fit))
        .collect();
    per_fit.sort_by(|left, right| left.fit_id.cmp(&right.fit_id));

    let mut hulls: BTreeMap<TypeId, HullCounts> = BTreeMap::new();
    for row in rows {
        let counts = hulls.entry(row.ship_type_id).or_insert_with(|| HullCounts {
            ship_type_id: row.ship_type_id,
            ..HullCounts::default()
        });
        counts.compared_fits += 1;
        if row.pass {
            counts.passing_fits += 1;
        } else {
            counts.failing_fits += 1;
        }
    }

    let mut top_mismatches: Vec<Mismatch> = rows
        .iter()
        .flat_map(|row| {
            row.failing().map(|delta| Mismatch {
                fit_id: row.fit_id.clone(),
                ship_type_id: row.ship_type_id,
                delta: delta.clone(),
            })
        })
        .collect();
    top_mismatches.sort_by(|left, right| {
        mismatch_order(&left.delta, &right.delta).then_with(|| left.fit_id.cmp(&right.fit_id))
    });
    top_mismatches.truncate(limits.top_mismatches);

    for entry in &mut missing {
        entry.golden = golden_ids.is_some_and(|ids| ids.contains(&entry.fit_id));
    }
    // Golden fits outside the corpus still need a reference; they have no hull to report.
    if let Some(golden_ids) = golden_ids {
        let known: BTreeSet<&str> = rows
            .iter()
            .map(|row| row.fit_id.as_str())
            .chain(missing.iter().map(|entry| entry.fit_id.as_str()))
            .collect();
        let unknown: Vec<MissingReference> = golden_ids
            .iter()
            .filter(|fit_id| !known.contains(fit_id.as_str()))
            .map(|fit_id| MissingReference {
                fit_id: fit_id.clone(),
                ship_type_id: 0,
                reason: MissingReason::Missing,
                detail: Some("golden fit has no corpus entry".to_string()),
                golden: true,
            })
            .collect();
        missing.extend(unknown);
    }
    missing.sort_by(|left, right| left.fit_id.cmp(&right.fit_id));

    let passing_fits = rows.iter().filter(|row| row.pass).count();
    ParitySummary {
        generated_at,
        sde_version: sde_version.to_string(),
        threshold_policy: policy.clone(),
        compared_fits: rows.len(),
        passing_fits,
        failing_fits: rows.len() - passing_fits,
        golden_fits: golden_ids.map_or(0, BTreeSet::len),
        missing_golden_references: missing.iter().filter(|entry| entry.golden).count(),
        missing_references: missing,
        per_fit,
        per_hull: hulls.into_values().collect(),
        top_mismatches,
        coverage_gaps: gaps.ranked(),
    }
}
