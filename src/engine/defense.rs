//! Layer HP, resist matrix and effective hit points.

use serde::Serialize;

use crate::data::ids;
use crate::data::pack::AttributeId;
use crate::engine::metrics::{DamageType, DamageVector, Layer, LayerResists};
use crate::engine::resolver::ResolvedItem;

/// Incoming-damage profile used for EHP: uniform across the four damage types.
/// Matches the reference tool's default so EHP values are comparable.
pub const REFERENCE_DAMAGE_PROFILE: DamageVector = DamageVector::uniform(0.25);

/// Lowest damage fraction a layer can take, whatever its resists.
pub const MIN_DAMAGE_FACTOR: f64 = 0.05;

/// Resists never reach 1.0; this is the ceiling after rounding to four decimals.
pub const MAX_RESIST: f64 = 0.9999;

const RESONANCE_ATTRIBUTES: [(Layer, [(DamageType, AttributeId); 4]); 3] = [
    (
        Layer::Shield,
        [
            (DamageType::Em, ids::attr::SHIELD_EM_RESONANCE),
            (DamageType::Thermal, ids::attr::SHIELD_THERMAL_RESONANCE),
            (DamageType::Kinetic, ids::attr::SHIELD_KINETIC_RESONANCE),
            (DamageType::Explosive, ids::attr::SHIELD_EXPLOSIVE_RESONANCE),
        ],
    ),
    (
        Layer::Armor,
        [
            (DamageType::Em, ids::attr::ARMOR_EM_RESONANCE),
            (DamageType::Thermal, ids::attr::ARMOR_THERMAL_RESONANCE),
            (DamageType::Kinetic, ids::attr::ARMOR_KINETIC_RESONANCE),
            (DamageType::Explosive, ids::attr::ARMOR_EXPLOSIVE_RESONANCE),
        ],
    ),
    (
        Layer::Hull,
        [
            (DamageType::Em, ids::attr::HULL_EM_RESONANCE),
            (DamageType::Thermal, ids::attr::HULL_THERMAL_RESONANCE),
            (DamageType::Kinetic, ids::attr::HULL_KINETIC_RESONANCE),
            (DamageType::Explosive, ids::attr::HULL_EXPLOSIVE_RESONANCE),
        ],
    ),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LayerHp {
    pub shield: f64,
    pub armor: f64,
    pub hull: f64,
}

impl LayerHp {
    pub fn get(&self, layer: Layer) -> f64 {
        match layer {
            Layer::Shield => self.shield,
            Layer::Armor => self.armor,
            Layer::Hull => self.hull,
        }
    }

    pub fn total(&self) -> f64 {
        self.shield + self.armor + self.hull
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenseSummary {
    pub hp: LayerHp,
    pub resists: LayerResists,
    pub ehp_by_layer: LayerHp,
    pub ehp: f64,
}

/// `1 - resonance`, clamped into `[0, MAX_RESIST]`. A missing resonance means no resist.
pub fn resist_from_resonance(resonance: Option<f64>) -> f64 {
    let resonance = resonance.filter(|value| value.is_finite()).unwrap_or(1.0);
    (1.0 - resonance).clamp(0.0, MAX_RESIST)
}

/// EHP of one layer against `profile`.
pub fn layer_ehp(hp: f64, resists: &DamageVector, profile: &DamageVector) -> f64 {
    let damage_factor = (1.0 - resists.weighted_by(profile)).max(MIN_DAMAGE_FACTOR);
    hp.max(0.0) / damage_factor
}

pub fn aggregate_defense(hull: &ResolvedItem) -> DefenseSummary {
    let mut resists = LayerResists::default();
    for (layer, cells) in RESONANCE_ATTRIBUTES {
        let profile = resists.layer_mut(layer);
        for (damage_type, attribute_id) in cells {
            *profile.get_mut(damage_type) =
                resist_from_resonance(hull.attributes.get(attribute_id));
        }
    }

    let hp = LayerHp {
        shield: hull.attributes.get_or(ids::attr::SHIELD_CAPACITY, 0.0),
        armor: hull.attributes.get_or(ids::attr::ARMOR_HP, 0.0),
        hull: hull.attributes.get_or(ids::attr::STRUCTURE_HP, 0.0),
    };
    let ehp_by_layer = LayerHp {
        shield: layer_ehp(hp.shield, &resists.shield, &REFERENCE_DAMAGE_PROFILE),
        armor: layer_ehp(hp.armor, &resists.armor, &REFERENCE_DAMAGE_PROFILE),
        hull: layer_ehp(hp.hull, &resists.hull, &REFERENCE_DAMAGE_PROFILE),
    };

    DefenseSummary {
        hp,
        resists,
        ehp_by_layer,
        ehp: ehp_by_layer.total(),
    }
}
