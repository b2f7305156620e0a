//! Remediation backlog: failing deltas clustered by mechanic family and ranked.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::data::pack::TypeId;
use crate::parity::compare::ComparisonRow;
use crate::parity::compare::round_delta;
use crate::parity::gate::GateEvaluation;

pub const SCORING_MODEL: &str = "followup-priority-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MechanicFamily {
    DamageOutput,
    EffectiveHitPoints,
    ResistProfile,
    Other,
}

impl MechanicFamily {
    /// Family of a metric by its report name.
    pub fn classify(metric: &str) -> Self {
        match metric {
            "dpsTotal" | "alpha" => Self::DamageOutput,
            "ehp" => Self::EffectiveHitPoints,
            name if name.starts_with("resists.") => Self::ResistProfile,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DamageOutput => "damage-output",
            Self::EffectiveHitPoints => "effective-hit-points",
            Self::ResistProfile => "resist-profile",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub error_severity: f64,
    pub hull_gate_pressure: f64,
    pub mechanic_reuse: usize,
    pub fit_prevalence: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogItem {
    pub id: String,
    pub family: MechanicFamily,
    pub fit_ids: Vec<String>,
    pub ship_type_ids: Vec<TypeId>,
    pub metrics: Vec<String>,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backlog {
    pub scoring_model: &'static str,
    pub items: Vec<BacklogItem>,
}

#[derive(Default)]
struct Cluster {
    fit_ids: BTreeSet<String>,
    ship_type_ids: BTreeSet<TypeId>,
    metrics: BTreeSet<String>,
    max_rel_delta: f64,
}

/// Hull pressure is `1 + min(deficit, required) / required`; uncovered hulls weigh up to 2x.
fn hull_pressure(gate: &GateEvaluation, ship_type_id: TypeId) -> f64 {
    let required = gate.required_fits_per_hull.max(1);
    let deficit = gate
        .hull(ship_type_id)
        .map_or(required, |hull| hull.deficit)
        .min(required);
    1.0 + deficit as f64 / required as f64
}

pub fn build_backlog(rows: &[ComparisonRow], gate: &GateEvaluation) -> Backlog {
    let mut clusters: BTreeMap<MechanicFamily, Cluster> = BTreeMap::new();
    for row in rows {
        for delta in row.failing() {
            let metric = delta.metric.to_string();
            let cluster = clusters.entry(MechanicFamily::classify(&metric)).or_default();
            cluster.fit_ids.insert(row.fit_id.clone());
            cluster.ship_type_ids.insert(row.ship_type_id);
            cluster.metrics.insert(metric);
            cluster.max_rel_delta = cluster.max_rel_delta.max(delta.rel_delta);
        }
    }

    let mut items: Vec<BacklogItem> = clusters
        .into_iter()
        .map(|(family, cluster)| {
            let error_severity = round_delta(cluster.max_rel_delta);
            let hull_gate_pressure = round_delta(
                cluster
                    .ship_type_ids
                    .iter()
                    .map(|ship_type_id| hull_pressure(gate, *ship_type_id))
                    .fold(1.0, f64::max),
            );
            let mechanic_reuse = cluster.ship_type_ids.len();
            let fit_prevalence = cluster.fit_ids.len();
            let score = round_delta(
                error_severity * hull_gate_pressure * mechanic_reuse as f64 * fit_prevalence as f64,
            );
            BacklogItem {
                id: format!("cluster-{}", family.as_str()),
                family,
                fit_ids: cluster.fit_ids.into_iter().collect(),
                ship_type_ids: cluster.ship_type_ids.into_iter().collect(),
                metrics: cluster.metrics.into_iter().collect(),
                score,
                score_breakdown: ScoreBreakdown {
                    error_severity,
                    hull_gate_pressure,
                    mechanic_reuse,
                    fit_prevalence,
                },
                status: "todo",
            }
        })
        .collect();

    items.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.family.as_str().cmp(right.family.as_str()))
            .then_with(|| left.id.cmp(&right.id))
    });

    Backlog {
        scoring_model: SCORING_MODEL,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_map_to_families() {
        assert_eq!(MechanicFamily::classify("dpsTotal"), MechanicFamily::DamageOutput);
        assert_eq!(MechanicFamily::classify("alpha"), MechanicFamily::DamageOutput);
        assert_eq!(MechanicFamily::classify("ehp"), MechanicFamily::EffectiveHitPoints);
        assert_eq!(
            MechanicFamily::classify("resists.armor.kin"),
            MechanicFamily::ResistProfile
        );
        assert_eq!(MechanicFamily::classify("capacitor"), MechanicFamily::Other);
    }
}
