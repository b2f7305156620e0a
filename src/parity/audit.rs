//! Effect coverage audit over the data pack.
//!
//! Lists which effect names carried by ships and modules the engine can model,
//! and which it cannot, with combat-relevant names pulled out for
//! prioritization. Gaps observed during a parity run are merged in by effect ID.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::data::ids;
use crate::data::pack::{CategoryId, DataPack, Domain, EffectDef, EffectId, TypeDef};
use crate::engine::coverage::GapTally;

/// Lowercase name fragments that mark an effect as combat-relevant.
pub const COMBAT_HINTS: [&str; 17] = [
    "bonus",
    "damage",
    "rof",
    "resist",
    "resonance",
    "velocity",
    "speed",
    "shield",
    "armor",
    "hull",
    "signature",
    "tracking",
    "range",
    "falloff",
    "drone",
    "missile",
    "turret",
];

const SAMPLE_TYPES: usize = 6;

pub fn is_combat_relevant(effect_name: &str) -> bool {
    let lower = effect_name.to_lowercase();
    COMBAT_HINTS.iter().any(|hint| lower.contains(hint))
}

/// An effect is modeled when at least one modifier can be applied by the resolver.
pub fn is_modeled(pack: &DataPack, effect: &EffectDef) -> bool {
    effect.modifiers.iter().any(|modifier| {
        modifier.domain != Domain::Target
            && pack.attribute(modifier.target_attribute_id).is_some()
            && pack.attribute(modifier.source_attribute_id).is_some()
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectUsage {
    pub effect_id: EffectId,
    pub name: String,
    pub carriers: usize,
    pub sample_types: Vec<String>,
    pub modeled: bool,
    pub combat_relevant: bool,
    /// Fits in the last parity run that hit a coverage gap on this effect.
    pub observed_gap_fits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAudit {
    pub types_scanned: usize,
    pub distinct_effects: usize,
    pub modeled_effects: usize,
    pub unmodeled_effects: usize,
    pub unmodeled: Vec<EffectUsage>,
    pub combat_focus: Vec<EffectUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedGap {
    pub effect_id: EffectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageAudit {
    pub generated_at: String,
    pub sde_version: String,
    pub ships: CategoryAudit,
    pub modules: CategoryAudit,
    pub observed_gaps: Vec<ObservedGap>,
}

fn audit_category(
    pack: &DataPack,
    types: &[&TypeDef],
    observed: &BTreeMap<EffectId, usize>,
) -> CategoryAudit {
    let mut carriers: BTreeMap<EffectId, Vec<&str>> = BTreeMap::new();
    for type_def in types {
        for effect_id in &type_def.effects {
            carriers
                .entry(*effect_id)
                .or_default()
                .push(type_def.name.as_str());
        }
    }

    let mut audit = CategoryAudit {
        types_scanned: types.len(),
        distinct_effects: carriers.len(),
        ..CategoryAudit::default()
    };
    for (effect_id, names) in carriers {
        let effect = pack.effect(effect_id);
        if effect.is_some_and(|effect| is_modeled(pack, effect)) {
            audit.modeled_effects += 1;
            continue;
        }
        let name = effect.map_or_else(|| format!("effect-{effect_id}"), |e| e.name.clone());
        audit.unmodeled.push(EffectUsage {
            effect_id,
            combat_relevant: is_combat_relevant(&name),
            name,
            carriers: names.len(),
            sample_types: names
                .iter()
                .take(SAMPLE_TYPES)
                .map(|name| name.to_string())
                .collect(),
            modeled: false,
            observed_gap_fits: observed.get(&effect_id).copied().unwrap_or(0),
        });
    }
    audit.unmodeled_effects = audit.unmodeled.len();
    audit.unmodeled.sort_by(|left, right| {
        right
            .observed_gap_fits
            .cmp(&left.observed_gap_fits)
            .then_with(|| right.carriers.cmp(&left.carriers))
            .then_with(|| left.name.cmp(&right.name))
    });
    audit.combat_focus = audit
        .unmodeled
        .iter()
        .filter(|usage| usage.combat_relevant)
        .cloned()
        .collect();
    audit
}

fn types_in(pack: &DataPack, category_id: CategoryId) -> Vec<&TypeDef> {
    pack.types_sorted()
        .into_iter()
        .filter(|type_def| type_def.category_id == category_id)
        .collect()
}

pub fn audit_pack(pack: &DataPack, observed: Option<&GapTally>, generated_at: String) -> CoverageAudit {
    let by_effect = observed.map(GapTally::by_effect).unwrap_or_default();
    let observed_gaps = by_effect
        .iter()
        .map(|(effect_id, fits)| ObservedGap {
            effect_id: *effect_id,
            name: pack.effect(*effect_id).map(|effect| effect.name.clone()),
            fits: *fits,
        })
        .collect();

    CoverageAudit {
        generated_at,
        sde_version: pack.sde_version().to_string(),
        ships: audit_category(pack, &types_in(pack, ids::category::SHIP), &by_effect),
        modules: audit_category(pack, &types_in(pack, ids::category::MODULE), &by_effect),
        observed_gaps,
    }
}

fn render_category(out: &mut String, title: &str, audit: &CategoryAudit) {
    let _ = writeln!(out, "## {title}\n");
    let _ = writeln!(out, "- Types scanned: {}", audit.types_scanned);
    let _ = writeln!(out, "- Distinct effects: {}", audit.distinct_effects);
    let _ = writeln!(out, "- Modeled: {}", audit.modeled_effects);
    let _ = writeln!(out, "- Unmodeled: {}\n", audit.unmodeled_effects);
    if audit.combat_focus.is_empty() {
        let _ = writeln!(out, "No combat-relevant effects are unmodeled.\n");
        return;
    }
    let _ = writeln!(out, "| Effect | ID | Carriers | Gap fits | Samples |");
    let _ = writeln!(out, "| --- | ---: | ---: | ---: | --- |");
    for usage in &audit.combat_focus {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            usage.name,
            usage.effect_id,
            usage.carriers,
            usage.observed_gap_fits,
            usage.sample_types.join(", ")
        );
    }
    out.push('\n');
}

pub fn render_markdown(audit: &CoverageAudit) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Dogma coverage audit\n");
    let _ = writeln!(out, "Generated {} against `{}`.\n", audit.generated_at, audit.sde_version);
    render_category(&mut out, "Ship effects", &audit.ships);
    render_category(&mut out, "Module effects", &audit.modules);
    if !audit.observed_gaps.is_empty() {
        let _ = writeln!(out, "## Gaps observed in parity run\n");
        for gap in &audit.observed_gaps {
            let name = gap.name.as_deref().unwrap_or("unknown");
            let _ = writeln!(out, "- {} ({}): {} fit(s)", name, gap.effect_id, gap.fits);
        }
    }
    out
}
