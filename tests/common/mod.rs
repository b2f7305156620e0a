//! Small hand-built data pack shared by the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dogma_parity::data::ids;
use dogma_parity::data::manifest::{sha256_hex, PackManifest};
use dogma_parity::data::pack::{
    AttributeDef, AttributeId, DataPack, Domain, EffectCategory, EffectDef, EffectId, ItemFilter,
    Modifier, Operation, PackFile, TypeDef, TypeId,
};
use dogma_parity::engine::metrics::{LayerResists, MetricResult, MetricSource};

pub const SDE_VERSION: &str = "sde-test-1";

pub const RIFTER: TypeId = 587;
pub const GATLING: TypeId = 2873;
pub const LIGHT_AUTOCANNON: TypeId = 2881;
pub const ARMOR_EM_HARDENER: TypeId = 11269;
pub const WEBIFIER: TypeId = 526;
pub const FEEDBACK_MODULE: TypeId = 9999;
pub const PROTOTYPE_MODULE: TypeId = 8888;
pub const BARRAGE: TypeId = 12608;
pub const HAIL: TypeId = 12625;
pub const WARRIOR: TypeId = 2488;
pub const HAMMERHEAD: TypeId = 2185;
pub const GUNNERY: TypeId = 3300;
pub const SMALL_PROJECTILE: TypeId = 3301;
pub const SHIELD_COMPENSATION: TypeId = 3419;
pub const TACTICAL_SHIELD: TypeId = 3420;

pub const MAX_VELOCITY: AttributeId = 37;
pub const SPEED_FACTOR: AttributeId = 20;
pub const EM_RESIST_BONUS: AttributeId = 984;
pub const SHIELD_RESIST_BONUS: AttributeId = 2010;
pub const SHIELD_RESONANCE_SKILL_BONUS: AttributeId = 2011;
pub const DAMAGE_MULTIPLIER_BONUS: AttributeId = 2020;
pub const SPEED_MULTIPLIER: AttributeId = 2030;
pub const FEEDBACK_A: AttributeId = 3000;
pub const FEEDBACK_B: AttributeId = 3001;

pub const UNKNOWN_EFFECT: EffectId = 77777;

const SHIELD_RESONANCES: [AttributeId; 4] = [
    ids::attr::SHIELD_EM_RESONANCE,
    ids::attr::SHIELD_THERMAL_RESONANCE,
    ids::attr::SHIELD_KINETIC_RESONANCE,
    ids::attr::SHIELD_EXPLOSIVE_RESONANCE,
];

pub fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a}");
}

fn attribute(attribute_id: AttributeId, name: &str, default_value: f64, stacking: bool) -> AttributeDef {
    AttributeDef {
        attribute_id,
        name: name.to_string(),
        default_value,
        high_is_good: true,
        stacking_group: stacking.then(|| name.to_string()),
    }
}

fn type_def(
    type_id: TypeId,
    name: &str,
    group_id: u32,
    category_id: u32,
    attributes: &[(AttributeId, f64)],
    effects: &[EffectId],
) -> TypeDef {
    TypeDef {
        type_id,
        name: name.to_string(),
        group_id,
        category_id,
        attributes: attributes.iter().copied().collect::<BTreeMap<_, _>>(),
        effects: effects.to_vec(),
    }
}

fn modifier(domain: Domain, target: AttributeId, source: AttributeId, operation: Operation) -> Modifier {
    Modifier {
        domain,
        filter: None,
        target_attribute_id: target,
        source_attribute_id: source,
        operation,
        skill_type_id: None,
    }
}

fn effect(effect_id: EffectId, name: &str, category: EffectCategory, modifiers: Vec<Modifier>) -> EffectDef {
    EffectDef {
        effect_id,
        name: name.to_string(),
        category,
        modifiers,
    }
}

pub fn pack_file() -> PackFile {
    let mut file = PackFile::new(SDE_VERSION);
    file.source = "integration-test".to_string();

    file.attributes = vec![
        attribute(ids::attr::STRUCTURE_HP, "hp", 0.0, false),
        attribute(SPEED_FACTOR, "speedFactor", 0.0, false),
        attribute(MAX_VELOCITY, "maxVelocity", 0.0, true),
        attribute(ids::attr::RATE_OF_FIRE, "speed", 0.0, false),
        attribute(ids::attr::DAMAGE_MULTIPLIER, "damageMultiplier", 1.0, true),
        attribute(ids::attr::EM_DAMAGE, "emDamage", 0.0, false),
        attribute(ids::attr::EXPLOSIVE_DAMAGE, "explosiveDamage", 0.0, false),
        attribute(ids::attr::KINETIC_DAMAGE, "kineticDamage", 0.0, false),
        attribute(ids::attr::THERMAL_DAMAGE, "thermalDamage", 0.0, false),
        attribute(ids::attr::SHIELD_CAPACITY, "shieldCapacity", 0.0, false),
        attribute(ids::attr::ARMOR_HP, "armorHP", 0.0, false),
        attribute(ids::attr::SHIELD_EM_RESONANCE, "shieldEmDamageResonance", 1.0, true),
        attribute(ids::attr::SHIELD_THERMAL_RESONANCE, "shieldThermalDamageResonance", 1.0, true),
        attribute(ids::attr::SHIELD_KINETIC_RESONANCE, "shieldKineticDamageResonance", 1.0, true),
        attribute(ids::attr::SHIELD_EXPLOSIVE_RESONANCE, "shieldExplosiveDamageResonance", 1.0, true),
        attribute(ids::attr::ARMOR_EM_RESONANCE, "armorEmDamageResonance", 1.0, true),
        attribute(ids::attr::ARMOR_THERMAL_RESONANCE, "armorThermalDamageResonance", 1.0, true),
        attribute(ids::attr::ARMOR_KINETIC_RESONANCE, "armorKineticDamageResonance", 1.0, true),
        attribute(ids::attr::ARMOR_EXPLOSIVE_RESONANCE, "armorExplosiveDamageResonance", 1.0, true),
        attribute(ids::attr::HULL_EM_RESONANCE, "emDamageResonance", 1.0, false),
        attribute(ids::attr::HULL_THERMAL_RESONANCE, "thermalDamageResonance", 1.0, false),
        attribute(ids::attr::HULL_KINETIC_RESONANCE, "kineticDamageResonance", 1.0, false),
        attribute(ids::attr::HULL_EXPLOSIVE_RESONANCE, "explosiveDamageResonance", 1.0, false),
        attribute(ids::attr::REQUIRED_SKILL_1, "requiredSkill1", 0.0, false),
        attribute(ids::attr::DRONE_BANDWIDTH, "droneBandwidth", 0.0, false),
        attribute(ids::attr::DRONE_BANDWIDTH_USED, "droneBandwidthUsed", 0.0, false),
        attribute(EM_RESIST_BONUS, "emDamageResistanceBonus", 0.0, false),
        attribute(SHIELD_RESIST_BONUS, "shieldResistanceBonus", 0.0, false),
        attribute(SHIELD_RESONANCE_SKILL_BONUS, "shieldResonanceSkillBonus", 0.0, false),
        attribute(DAMAGE_MULTIPLIER_BONUS, "damageMultiplierBonus", 0.0, false),
        attribute(SPEED_MULTIPLIER, "speedMultiplier", 1.0, false),
        attribute(FEEDBACK_A, "feedbackA", 0.0, false),
        attribute(FEEDBACK_B, "feedbackB", 0.0, false),
    ];

    file.effects = vec![
        effect(ids::effect::LO_POWER, "loPower", EffectCategory::OnFit, Vec::new()),
        effect(ids::effect::HI_POWER, "hiPower", EffectCategory::OnFit, Vec::new()),
        effect(ids::effect::MED_POWER, "medPower", EffectCategory::OnFit, Vec::new()),
        effect(ids::effect::TURRET_FITTED, "turretFitted", EffectCategory::OnFit, Vec::new()),
        effect(
            5001,
            "armorEmHardening",
            EffectCategory::Active,
            vec![modifier(
                Domain::Ship,
                ids::attr::ARMOR_EM_RESONANCE,
                EM_RESIST_BONUS,
                Operation::PostPercent,
            )],
        ),
        effect(
            5002,
            "decreaseTargetSpeed",
            EffectCategory::Active,
            vec![modifier(Domain::Target, MAX_VELOCITY, SPEED_FACTOR, Operation::PostPercent)],
        ),
        effect(
            5003,
            "feedbackLoop",
            EffectCategory::Passive,
            vec![
                modifier(Domain::Item, FEEDBACK_A, FEEDBACK_B, Operation::ModAdd),
                modifier(Domain::Item, FEEDBACK_B, FEEDBACK_A, Operation::ModAdd),
            ],
        ),
        effect(
            6001,
            "shieldCompensationBonus",
            EffectCategory::Passive,
            SHIELD_RESONANCES
                .iter()
                .map(|target| {
                    modifier(Domain::Ship, *target, SHIELD_RESIST_BONUS, Operation::PostPercent)
                })
                .collect(),
        ),
        effect(
            6002,
            "tacticalShieldManipulationBonus",
            EffectCategory::Passive,
            SHIELD_RESONANCES
                .iter()
                .map(|target| {
                    modifier(
                        Domain::Ship,
                        *target,
                        SHIELD_RESONANCE_SKILL_BONUS,
                        Operation::SkillScaled,
                    )
                })
                .collect(),
        ),
        effect(
            6010,
            "smallProjectileDamageBonus",
            EffectCategory::Passive,
            vec![Modifier {
                filter: Some(ItemFilter {
                    required_skill_id: Some(SMALL_PROJECTILE),
                    ..ItemFilter::default()
                }),
                ..modifier(
                    Domain::Group,
                    ids::attr::DAMAGE_MULTIPLIER,
                    DAMAGE_MULTIPLIER_BONUS,
                    Operation::SkillScaled,
                )
            }],
        ),
        effect(
            6020,
            "ammoSpeedMultiplier",
            EffectCategory::Passive,
            vec![modifier(
                Domain::Other,
                ids::attr::RATE_OF_FIRE,
                SPEED_MULTIPLIER,
                Operation::PostMul,
            )],
        ),
    ];

    file.types = vec![
        type_def(
            RIFTER,
            "Rifter",
            25,
            ids::category::SHIP,
            &[
                (ids::attr::SHIELD_CAPACITY, 400.0),
                (ids::attr::ARMOR_HP, 350.0),
                (ids::attr::STRUCTURE_HP, 300.0),
                (ids::attr::SHIELD_EM_RESONANCE, 1.0),
                (ids::attr::SHIELD_THERMAL_RESONANCE, 0.8),
                (ids::attr::SHIELD_KINETIC_RESONANCE, 0.6),
                (ids::attr::SHIELD_EXPLOSIVE_RESONANCE, 0.5),
                (ids::attr::ARMOR_EM_RESONANCE, 0.5),
                (ids::attr::ARMOR_THERMAL_RESONANCE, 0.65),
                (ids::attr::ARMOR_KINETIC_RESONANCE, 0.75),
                (ids::attr::ARMOR_EXPLOSIVE_RESONANCE, 0.9),
                (ids::attr::HULL_EM_RESONANCE, 0.67),
                (ids::attr::HULL_THERMAL_RESONANCE, 0.67),
                (ids::attr::HULL_KINETIC_RESONANCE, 0.67),
                (ids::attr::HULL_EXPLOSIVE_RESONANCE, 0.67),
                (ids::attr::DRONE_BANDWIDTH, 25.0),
                (MAX_VELOCITY, 365.0),
            ],
            &[],
        ),
        type_def(
            GATLING,
            "125mm Gatling AutoCannon II",
            55,
            ids::category::MODULE,
            &[
                (ids::attr::RATE_OF_FIRE, 3000.0),
                (ids::attr::DAMAGE_MULTIPLIER, 1.0),
                (ids::attr::REQUIRED_SKILL_1, f64::from(GUNNERY)),
            ],
            &[ids::effect::HI_POWER, ids::effect::TURRET_FITTED],
        ),
        type_def(
            LIGHT_AUTOCANNON,
            "150mm Light AutoCannon II",
            55,
            ids::category::MODULE,
            &[
                (ids::attr::RATE_OF_FIRE, 2500.0),
                (ids::attr::DAMAGE_MULTIPLIER, 2.0),
                (ids::attr::REQUIRED_SKILL_1, f64::from(SMALL_PROJECTILE)),
            ],
            &[ids::effect::HI_POWER, ids::effect::TURRET_FITTED],
        ),
        type_def(
            ARMOR_EM_HARDENER,
            "Armor EM Hardener II",
            328,
            ids::category::MODULE,
            &[(EM_RESIST_BONUS, -30.0)],
            &[ids::effect::LO_POWER, 5001],
        ),
        type_def(
            WEBIFIER,
            "Stasis Webifier II",
            65,
            ids::category::MODULE,
            &[(SPEED_FACTOR, -60.0)],
            &[ids::effect::MED_POWER, 5002],
        ),
        type_def(
            FEEDBACK_MODULE,
            "Feedback Loop Module",
            1,
            ids::category::MODULE,
            &[(FEEDBACK_A, 1.0), (FEEDBACK_B, 2.0)],
            &[ids::effect::LO_POWER, 5003],
        ),
        type_def(
            PROTOTYPE_MODULE,
            "Prototype Module",
            1,
            ids::category::MODULE,
            &[],
            &[ids::effect::LO_POWER, UNKNOWN_EFFECT],
        ),
        type_def(
            BARRAGE,
            "Barrage S",
            83,
            ids::category::CHARGE,
            &[(ids::attr::KINETIC_DAMAGE, 100.0), (ids::attr::EXPLOSIVE_DAMAGE, 50.0)],
            &[],
        ),
        type_def(
            HAIL,
            "Hail S",
            83,
            ids::category::CHARGE,
            &[
                (ids::attr::KINETIC_DAMAGE, 60.0),
                (ids::attr::EXPLOSIVE_DAMAGE, 140.0),
                (SPEED_MULTIPLIER, 1.25),
            ],
            &[6020],
        ),
        type_def(
            WARRIOR,
            "Warrior II",
            100,
            ids::category::DRONE,
            &[
                (ids::attr::RATE_OF_FIRE, 4000.0),
                (ids::attr::DAMAGE_MULTIPLIER, 1.0),
                (ids::attr::EXPLOSIVE_DAMAGE, 24.0),
                (ids::attr::DRONE_BANDWIDTH_USED, 5.0),
            ],
            &[],
        ),
        type_def(
            HAMMERHEAD,
            "Hammerhead II",
            100,
            ids::category::DRONE,
            &[
                (ids::attr::RATE_OF_FIRE, 5000.0),
                (ids::attr::DAMAGE_MULTIPLIER, 1.0),
                (ids::attr::THERMAL_DAMAGE, 60.0),
                (ids::attr::DRONE_BANDWIDTH_USED, 10.0),
            ],
            &[],
        ),
        type_def(GUNNERY, "Gunnery", 255, ids::category::SKILL, &[], &[]),
        type_def(
            SMALL_PROJECTILE,
            "Small Projectile Turret",
            255,
            ids::category::SKILL,
            &[(DAMAGE_MULTIPLIER_BONUS, 5.0)],
            &[6010],
        ),
        type_def(
            SHIELD_COMPENSATION,
            "Shield Compensation",
            257,
            ids::category::SKILL,
            &[(SHIELD_RESIST_BONUS, -10.0)],
            &[6001],
        ),
        type_def(
            TACTICAL_SHIELD,
            "Tactical Shield Manipulation",
            257,
            ids::category::SKILL,
            &[(SHIELD_RESONANCE_SKILL_BONUS, -2.0)],
            &[6002],
        ),
    ];
    file
}

pub fn pack() -> DataPack {
    DataPack::from_file(pack_file()).expect("test pack should index")
}

/// Scenario B: one gatling with Barrage, 150 volley every 3 seconds.
pub const GATLING_EFT: &str = "[Rifter, Gatling]\n\n125mm Gatling AutoCannon II, Barrage S\n";

pub const HARDENED_EFT: &str = "[Rifter, Hardened]\nArmor EM Hardener II\nArmor EM Hardener II\n\n125mm Gatling AutoCannon II, Barrage S\n";

pub fn reference_result(fit_id: &str, dps_total: f64, alpha: f64, ehp: f64) -> MetricResult {
    MetricResult {
        fit_id: fit_id.to_string(),
        ship_type_id: RIFTER,
        source: MetricSource::Reference,
        sde_version: SDE_VERSION.to_string(),
        dps_total,
        alpha,
        ehp,
        resists: LayerResists::default(),
        metadata: BTreeMap::new(),
    }
}

/// Pack, manifest and config in `dir`. Returns the config path.
pub fn write_workspace(dir: &Path) -> PathBuf {
    let pack_bytes = serde_json::to_vec_pretty(&pack_file()).expect("pack should serialize");
    fs::write(dir.join("pack.json"), &pack_bytes).expect("pack should be written");
    let manifest = PackManifest {
        active_version: SDE_VERSION.to_string(),
        pack_file: "pack.json".to_string(),
        sha256: Some(sha256_hex(&pack_bytes)),
        generated_at: None,
    };
    fs::write(
        dir.join("manifest.json"),
        serde_json::to_vec_pretty(&manifest).expect("manifest should serialize"),
    )
    .expect("manifest should be written");

    let config_path = dir.join("dogma-parity.yaml");
    let config = format!(
        "manifestPath: {dir}/manifest.json\ncorpusPath: {dir}/fit-corpus.jsonl\nreferencePath: {dir}/reference-results.jsonl\ngoldenIdsPath: {dir}/golden-fit-ids.json\nreportsDir: {dir}/reports\nworkers: 2\ngate:\n  requiredFitsPerHull: 1\n",
        dir = dir.display()
    );
    fs::write(&config_path, config).expect("config should be written");
    config_path
}
