//! Coverage gate: per-hull reference counts and ordered hull phases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::pack::TypeId;
use crate::parity::summary::{HullCounts, ParitySummary};

pub const DEFAULT_REQUIRED_FITS_PER_HULL: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseHull {
    pub ship_type_id: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatePhase {
    pub phase: String,
    pub hulls: Vec<PhaseHull>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    pub required_fits_per_hull: usize,
    /// Evaluated in order; an empty list gates every compared hull.
    pub phases: Vec<GatePhase>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            required_fits_per_hull: DEFAULT_REQUIRED_FITS_PER_HULL,
            phases: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HullCoverage {
    pub ship_type_id: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_name: Option<String>,
    pub referenced_fits: usize,
    pub passing_fits: usize,
    pub failing_fits: usize,
    pub required_fits: usize,
    pub deficit: usize,
    pub covered: bool,
}

impl HullCoverage {
    fn new(counts: &HullCounts, ship_name: Option<String>, required: usize) -> Self {
        let deficit = required.saturating_sub(counts.compared_fits);
        Self {
            ship_type_id: counts.ship_type_id,
            ship_name,
            referenced_fits: counts.compared_fits,
            passing_fits: counts.passing_fits,
            failing_fits: counts.failing_fits,
            required_fits: required,
            deficit,
            covered: deficit == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    Complete,
    InProgress,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseEvaluation {
    pub phase: String,
    pub status: PhaseStatus,
    pub eligible: bool,
    pub target_met: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by_phase: Option<String>,
    pub hulls: Vec<HullCoverage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateEvaluation {
    pub required_fits_per_hull: usize,
    pub compared_fits: usize,
    pub failing_fits: usize,
    pub hulls: Vec<HullCoverage>,
    pub phases: Vec<PhaseEvaluation>,
    pub active_phase: Option<String>,
    pub pass: bool,
    pub reasons: Vec<String>,
}

impl GateEvaluation {
    pub fn hull(&self, ship_type_id: TypeId) -> Option<&HullCoverage> {
        self.hulls
            .iter()
            .find(|hull| hull.ship_type_id == ship_type_id)
    }
}

pub fn evaluate_gate(summary: &ParitySummary, config: &GateConfig) -> GateEvaluation {
    let required = config.required_fits_per_hull.max(1);
    let counts: BTreeMap<TypeId, &HullCounts> = summary
        .per_hull
        .iter()
        .map(|counts| (counts.ship_type_id, counts))
        .collect();
    let coverage_for = |ship_type_id: TypeId, ship_name: Option<String>| {
        let empty = HullCounts {
            ship_type_id,
            ..HullCounts::default()
        };
        let counts = counts.get(&ship_type_id).copied().unwrap_or(&empty);
        HullCoverage::new(counts, ship_name, required)
    };

    let mut blocked_by: Option<String> = None;
    let mut phases = Vec::with_capacity(config.phases.len());
    for definition in &config.phases {
        let hulls: Vec<HullCoverage> = definition
            .hulls
            .iter()
            .map(|hull| coverage_for(hull.ship_type_id, hull.ship_name.clone()))
            .collect();
        let target_met = hulls.iter().all(|hull| hull.covered);
        let eligible = blocked_by.is_none();
        let status = match (eligible, target_met) {
            (true, true) => PhaseStatus::Complete,
            (true, false) => PhaseStatus::InProgress,
            (false, _) => PhaseStatus::Blocked,
        };
        phases.push(PhaseEvaluation {
            phase: definition.phase.clone(),
            status,
            eligible,
            target_met,
            blocked_by_phase: if eligible { None } else { blocked_by.clone() },
            hulls,
        });
        if eligible && !target_met {
            blocked_by = Some(definition.phase.clone());
        }
    }

    let hulls: Vec<HullCoverage> = summary
        .per_hull
        .iter()
        .map(|counts| HullCoverage::new(counts, None, required))
        .collect();

    let mut reasons = Vec::new();
    if summary.compared_fits == 0 {
        reasons.push("no fits were compared".to_string());
    }
    if summary.failing_fits > 0 {
        reasons.push(format!("{} compared fit(s) fail", summary.failing_fits));
    }
    if summary.missing_golden_references > 0 {
        reasons.push(format!(
            "{} golden reference(s) missing",
            summary.missing_golden_references
        ));
    }
    let gated: Vec<&HullCoverage> = if phases.is_empty() {
        hulls.iter().collect()
    } else {
        phases.iter().flat_map(|phase| phase.hulls.iter()).collect()
    };
    for hull in gated.iter().filter(|hull| !hull.covered) {
        reasons.push(format!(
            "hull {} needs {} more referenced fit(s)",
            hull.ship_type_id, hull.deficit
        ));
    }

    GateEvaluation {
        required_fits_per_hull: required,
        compared_fits: summary.compared_fits,
        failing_fits: summary.failing_fits,
        active_phase: phases
            .iter()
            .find(|phase| phase.status != PhaseStatus::Complete)
            .map(|phase| phase.phase.clone()),
        pass: reasons.is_empty(),
        hulls,
        phases,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parity::compare::ThresholdPolicy;

    fn summary(per_hull: &[(TypeId, usize, usize)]) -> ParitySummary {
        let per_hull: Vec<HullCounts> = per_hull
            .iter()
            .map(|&(ship_type_id, passing, failing)| HullCounts {
                ship_type_id,
                compared_fits: passing + failing,
                passing_fits: passing,
                failing_fits: failing,
            })
            .collect();
        ParitySummary {
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            sde_version: "sde-1".to_string(),
            threshold_policy: ThresholdPolicy::default(),
            compared_fits: per_hull.iter().map(|hull| hull.compared_fits).sum(),
            passing_fits: per_hull.iter().map(|hull| hull.passing_fits).sum(),
            failing_fits: per_hull.iter().map(|hull| hull.failing_fits).sum(),
            golden_fits: 0,
            missing_golden_references: 0,
            missing_references: Vec::new(),
            per_fit: Vec::new(),
            per_hull,
            top_mismatches: Vec::new(),
            coverage_gaps: Vec::new(),
        }
    }

    fn phase(name: &str, hulls: &[TypeId]) -> GatePhase {
        GatePhase {
            phase: name.to_string(),
            hulls: hulls
                .iter()
                .map(|&ship_type_id| PhaseHull {
                    ship_type_id,
                    ship_name: None,
                })
                .collect(),
        }
    }

    #[test]
    fn failing_fits_still_count_toward_coverage() {
        let config = GateConfig {
            required_fits_per_hull: 3,
            phases: Vec::new(),
        };
        let gate = evaluate_gate(&summary(&[(1, 1, 2)]), &config);

        let hull = gate.hull(1).expect("hull 1");
        assert_eq!(hull.deficit, 0);
        assert!(hull.covered);
        assert!(!gate.pass);
        assert_eq!(gate.reasons, vec!["2 compared fit(s) fail".to_string()]);
    }

    #[test]
    fn phase_hulls_without_fits_report_full_deficit() {
        let config = GateConfig {
            required_fits_per_hull: 2,
            phases: vec![phase("cruisers", &[1, 2])],
        };
        let gate = evaluate_gate(&summary(&[(1, 2, 0)]), &config);

        let missing = &gate.phases[0].hulls[1];
        assert_eq!(missing.referenced_fits, 0);
        assert_eq!(missing.deficit, 2);
        assert_eq!(gate.phases[0].status, PhaseStatus::InProgress);
        assert_eq!(gate.active_phase.as_deref(), Some("cruisers"));
        assert_eq!(gate.reasons, vec!["hull 2 needs 2 more referenced fit(s)".to_string()]);
    }

    #[test]
    fn hulls_outside_phases_are_not_gated() {
        let config = GateConfig {
            required_fits_per_hull: 1,
            phases: vec![phase("frigates", &[1])],
        };
        let gate = evaluate_gate(&summary(&[(1, 1, 0), (9, 0, 0)]), &config);

        assert!(gate.pass, "{:?}", gate.reasons);
        assert_eq!(gate.active_phase, None);
    }

    #[test]
    fn missing_golden_references_fail_a_covered_gate() {
        let config = GateConfig {
            required_fits_per_hull: 1,
            phases: Vec::new(),
        };
        let mut covered = summary(&[(1, 1, 0)]);
        covered.golden_fits = 2;
        covered.missing_golden_references = 1;
        let gate = evaluate_gate(&covered, &config);

        assert!(!gate.pass);
        assert_eq!(gate.reasons, vec!["1 golden reference(s) missing".to_string()]);
    }

    #[test]
    fn zero_requirement_is_treated_as_one() {
        let config = GateConfig {
            required_fits_per_hull: 0,
            phases: Vec::new(),
        };
        let gate = evaluate_gate(&summary(&[]), &config);

        assert_eq!(gate.required_fits_per_hull, 1);
        assert_eq!(gate.reasons, vec!["no fits were compared".to_string()]);
    }
}
