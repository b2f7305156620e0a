//! Well-known static data identifiers read by the metric aggregators.
//!
//! Effect application is data-driven and never looks at these; offense,
//! defense, drone limits and EFT slot guessing do, and the resolver seeds
//! [attr::AGGREGATED] from pack defaults so those readers see them.

use super::pack::{AttributeId, CategoryId, EffectId};

pub mod attr {
    use super::AttributeId;

    pub const STRUCTURE_HP: AttributeId = 9;
    pub const RATE_OF_FIRE: AttributeId = 51;
    pub const DAMAGE_MULTIPLIER: AttributeId = 64;

    pub const EM_DAMAGE: AttributeId = 114;
    pub const EXPLOSIVE_DAMAGE: AttributeId = 116;
    pub const KINETIC_DAMAGE: AttributeId = 117;
    pub const THERMAL_DAMAGE: AttributeId = 118;

    pub const SHIELD_CAPACITY: AttributeId = 263;
    pub const ARMOR_HP: AttributeId = 265;

    pub const SHIELD_EM_RESONANCE: AttributeId = 271;
    pub const SHIELD_EXPLOSIVE_RESONANCE: AttributeId = 272;
    pub const SHIELD_KINETIC_RESONANCE: AttributeId = 273;
    pub const SHIELD_THERMAL_RESONANCE: AttributeId = 274;

    pub const ARMOR_EM_RESONANCE: AttributeId = 267;
    pub const ARMOR_EXPLOSIVE_RESONANCE: AttributeId = 268;
    pub const ARMOR_KINETIC_RESONANCE: AttributeId = 269;
    pub const ARMOR_THERMAL_RESONANCE: AttributeId = 270;

    pub const HULL_EM_RESONANCE: AttributeId = 113;
    pub const HULL_EXPLOSIVE_RESONANCE: AttributeId = 111;
    pub const HULL_KINETIC_RESONANCE: AttributeId = 109;
    pub const HULL_THERMAL_RESONANCE: AttributeId = 110;

    pub const REQUIRED_SKILL_1: AttributeId = 182;
    pub const REQUIRED_SKILL_2: AttributeId = 183;
    pub const REQUIRED_SKILL_3: AttributeId = 184;

    pub const DRONE_BANDWIDTH: AttributeId = 1271;
    pub const DRONE_BANDWIDTH_USED: AttributeId = 1272;

    /// Read by the aggregators on every item, so they always carry a value
    /// (the pack default when the type and its modifiers leave them unset).
    pub const AGGREGATED: [AttributeId; 23] = [
        STRUCTURE_HP,
        RATE_OF_FIRE,
        DAMAGE_MULTIPLIER,
        EM_DAMAGE,
        EXPLOSIVE_DAMAGE,
        KINETIC_DAMAGE,
        THERMAL_DAMAGE,
        SHIELD_CAPACITY,
        ARMOR_HP,
        SHIELD_EM_RESONANCE,
        SHIELD_EXPLOSIVE_RESONANCE,
        SHIELD_KINETIC_RESONANCE,
        SHIELD_THERMAL_RESONANCE,
        ARMOR_EM_RESONANCE,
        ARMOR_EXPLOSIVE_RESONANCE,
        ARMOR_KINETIC_RESONANCE,
        ARMOR_THERMAL_RESONANCE,
        HULL_EM_RESONANCE,
        HULL_EXPLOSIVE_RESONANCE,
        HULL_KINETIC_RESONANCE,
        HULL_THERMAL_RESONANCE,
        DRONE_BANDWIDTH,
        DRONE_BANDWIDTH_USED,
    ];
}

pub mod category {
    use super::CategoryId;

    pub const SHIP: CategoryId = 6;
    pub const MODULE: CategoryId = 7;
    pub const CHARGE: CategoryId = 8;
    pub const SKILL: CategoryId = 16;
    pub const IMPLANT: CategoryId = 20;
    pub const DRONE: CategoryId = 18;
    pub const SUBSYSTEM: CategoryId = 32;

    /// Sources in these categories never enter a stacking-penalty chain.
    pub const PENALTY_EXEMPT: [CategoryId; 5] = [SHIP, CHARGE, SKILL, IMPLANT, SUBSYSTEM];
}

pub mod effect {
    use super::EffectId;

    pub const LO_POWER: EffectId = 11;
    pub const HI_POWER: EffectId = 12;
    pub const MED_POWER: EffectId = 13;
    pub const LAUNCHER_FITTED: EffectId = 40;
    pub const TURRET_FITTED: EffectId = 42;
    pub const RIG_SLOT: EffectId = 2663;
}

/// Maximum drones a pilot can have in space at once.
pub const MAX_ACTIVE_DRONES: u32 = 5;
