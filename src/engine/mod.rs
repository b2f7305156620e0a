pub mod coverage;
pub mod defense;
pub mod metrics;
pub mod offense;
pub mod resolver;
pub mod stacking;

use serde::Serialize;
use tracing::debug;

use crate::data::pack::DataPack;
use crate::error::FitError;
use crate::fit::model::Fit;

pub use coverage::{CoverageGap, CoverageLedger, GapCount, GapTally};
pub use defense::{
    aggregate_defense, layer_ehp, resist_from_resonance, DefenseSummary, LayerHp, MAX_RESIST,
    MIN_DAMAGE_FACTOR, REFERENCE_DAMAGE_PROFILE,
};
pub use metrics::{
    round_metric, DamageType, DamageVector, Layer, LayerResists, MetricKey, MetricResult,
    MetricSource, ResistProfile,
};
pub use offense::{aggregate_offense, launched_drones, OffenseSummary, WeaponContribution, WeaponKind};
pub use resolver::{
    resolve, ItemRole, ResolvedAttributeSet, ResolvedDrone, ResolvedFit, ResolvedItem,
    ResolvedModule,
};
pub use stacking::{penalty_coefficient, ModifierStack, StackContribution};

/// Everything the engine knows about one fit: the comparable result plus the
/// breakdowns it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitMetrics {
    pub result: MetricResult,
    pub offense: OffenseSummary,
    pub defense: DefenseSummary,
    pub coverage_gaps: Vec<CoverageGap>,
}

/// Resolve a fit and aggregate it into a Metric Result.
pub fn calculate(pack: &DataPack, fit: &Fit) -> Result<FitMetrics, FitError> {
    let resolved = resolve(pack, fit)?;
    let offense = aggregate_offense(pack, &resolved);
    let defense = aggregate_defense(&resolved.hull);

    let result = MetricResult {
        fit_id: fit.fit_id().to_string(),
        ship_type_id: fit.hull_type_id(),
        source: MetricSource::Engine,
        sde_version: pack.sde_version().to_string(),
        dps_total: offense.dps_total,
        alpha: offense.alpha,
        ehp: defense.ehp,
        resists: defense.resists,
        metadata: Default::default(),
    }
    .rounded();

    debug!(
        fit_id = fit.fit_id(),
        dps = result.dps_total,
        ehp = result.ehp,
        gaps = resolved.coverage_gaps.len(),
        "calculated fit"
    );

    Ok(FitMetrics {
        result,
        offense,
        defense,
        coverage_gaps: resolved.coverage_gaps,
    })
}
