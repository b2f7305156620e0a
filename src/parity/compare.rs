//! Per-metric comparison of an engine result against a reference result.

use serde::{Deserialize, Serialize};

use crate::data::pack::TypeId;
use crate::engine::metrics::{MetricKey, MetricResult};

/// Denominator floor for relative deltas against a zero expectation.
pub const REL_DENOMINATOR_FLOOR: f64 = 1e-9;

/// Round a delta to six decimals so boundary cases compare exactly.
pub fn round_delta(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// `|actual - expected| / max(1e-9, |expected|)`, rounded to six decimals.
pub fn relative_delta(actual: f64, expected: f64) -> f64 {
    round_delta((actual - expected).abs() / expected.abs().max(REL_DENOMINATOR_FLOOR))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdPolicy {
    pub mode: String,
    /// Inclusive relative ceiling for scalar metrics.
    pub rel_max: f64,
    /// Inclusive absolute ceiling for resist cells.
    pub resist_abs_max: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            mode: "followup-10pct".to_string(),
            rel_max: 0.10,
            resist_abs_max: 0.05,
        }
    }
}

impl ThresholdPolicy {
    /// Tighter policy used to gate CI runs.
    pub fn ci() -> Self {
        Self {
            mode: "ci".to_string(),
            rel_max: 0.05,
            resist_abs_max: 0.03,
        }
    }

    pub fn passes(&self, metric: MetricKey, abs_delta: f64, rel_delta: f64) -> bool {
        if metric.is_resist() {
            abs_delta <= self.resist_abs_max
        } else {
            rel_delta <= self.rel_max
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub metric: MetricKey,
    pub actual: f64,
    pub expected: f64,
    pub abs_delta: f64,
    pub rel_delta: f64,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub fit_id: String,
    pub ship_type_id: TypeId,
    pub deltas: Vec<MetricDelta>,
    pub pass: bool,
}

impl ComparisonRow {
    pub fn max_rel_delta(&self) -> f64 {
        self.deltas
            .iter()
            .map(|delta| delta.rel_delta)
            .fold(0.0, f64::max)
    }

    pub fn failing(&self) -> impl Iterator<Item = &MetricDelta> {
        self.deltas.iter().filter(|delta| !delta.pass)
    }
}

pub fn compare_metric(
    metric: MetricKey,
    actual: f64,
    expected: f64,
    policy: &ThresholdPolicy,
) -> MetricDelta {
    let abs_delta = round_delta((actual - expected).abs());
    let rel_delta = relative_delta(actual, expected);
    MetricDelta {
        metric,
        actual,
        expected,
        abs_delta,
        rel_delta,
        pass: policy.passes(metric, abs_delta, rel_delta),
    }
}

/// Compare every metric of `actual` against `expected`.
pub fn compare_results(
    expected: &MetricResult,
    actual: &MetricResult,
    policy: &ThresholdPolicy,
) -> ComparisonRow {
    let deltas: Vec<MetricDelta> = MetricKey::all()
        .into_iter()
        .map(|metric| compare_metric(metric, actual.value(metric), expected.value(metric), policy))
        .collect();
    let pass = deltas.iter().all(|delta| delta.pass);
    ComparisonRow {
        fit_id: actual.fit_id.clone(),
        ship_type_id: actual.ship_type_id,
        deltas,
        pass,
    }
}
