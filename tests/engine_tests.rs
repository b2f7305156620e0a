mod common;

use common::*;
use dogma_parity::data::ids;
use dogma_parity::data::pack::DataPack;
use dogma_parity::engine::{
    calculate, launched_drones, penalty_coefficient, resolve, CoverageGap, DamageType, Layer,
    MAX_RESIST,
};
use dogma_parity::fit::{parse_eft, Fit, FittedModule, ModuleState, SkillProfile, SlotKind};
use proptest::prelude::*;

fn gatling_fit(pack: &DataPack) -> Fit {
    Fit::builder("gatling", RIFTER)
        .module(FittedModule::new(GATLING, SlotKind::High).with_charge(BARRAGE))
        .build(pack)
        .expect("fit should build")
}

fn hardened_fit(pack: &DataPack, states: &[ModuleState]) -> Fit {
    states
        .iter()
        .fold(Fit::builder("hardened", RIFTER), |builder, state| {
            builder.module(FittedModule::new(ARMOR_EM_HARDENER, SlotKind::Low).with_state(*state))
        })
        .build(pack)
        .expect("fit should build")
}

#[test]
fn skill_bonuses_apply_at_full_value_outside_penalty_chains() {
    let pack = pack();
    let fit = Fit::builder("bare", RIFTER).build(&pack).expect("fit");
    let metrics = calculate(&pack, &fit).expect("calculate");

    // 1 - (0.9 * 0.9), displayed as 0.19 rather than 0.20 or 0.1899...
    assert_eq!(metrics.result.resists.get(Layer::Shield, DamageType::Em), 0.19);
    assert_eq!(metrics.result.resists.get(Layer::Shield, DamageType::Thermal), 0.352);
    assert_eq!(metrics.result.resists.get(Layer::Armor, DamageType::Em), 0.5);
    assert!(metrics.coverage_gaps.is_empty(), "{:?}", metrics.coverage_gaps);
}

#[test]
fn skill_scaled_bonus_follows_trained_level() {
    let pack = pack();
    let fit = Fit::builder("untrained", RIFTER)
        .skills(SkillProfile::default().with_level(TACTICAL_SHIELD, 0))
        .build(&pack)
        .expect("fit");
    let metrics = calculate(&pack, &fit).expect("calculate");

    assert_eq!(metrics.result.resists.get(Layer::Shield, DamageType::Em), 0.1);
}

#[test]
fn single_turret_yields_volley_over_cycle_time() {
    let pack = pack();
    let metrics = calculate(&pack, &gatling_fit(&pack)).expect("calculate");

    assert_eq!(metrics.result.dps_total, 50.0);
    assert_eq!(metrics.result.alpha, 150.0);
    assert_eq!(metrics.offense.weapons.len(), 1);
    assert_eq!(metrics.offense.weapons[0].cycle_seconds, 3.0);
    assert_eq!(metrics.offense.weapons[0].charge_type_id, Some(BARRAGE));
}

#[test]
fn eft_text_calculates_like_the_built_fit() {
    let pack = pack();
    let parsed = parse_eft(&pack, "gatling", GATLING_EFT).expect("eft should parse");
    assert!(parsed.unknown_lines.is_empty());

    let from_eft = calculate(&pack, &parsed.fit).expect("calculate");
    let from_builder = calculate(&pack, &gatling_fit(&pack)).expect("calculate");
    assert_eq!(from_eft.result, from_builder.result);
}

#[test]
fn group_skill_bonus_reaches_modules_requiring_the_skill() {
    let pack = pack();
    let build = |level: u8| {
        Fit::builder("light", RIFTER)
            .module(FittedModule::new(LIGHT_AUTOCANNON, SlotKind::High).with_charge(BARRAGE))
            .skills(SkillProfile::default().with_level(SMALL_PROJECTILE, level))
            .build(&pack)
            .expect("fit")
    };

    // 2.0 * (1 + 5 * 5%) = 2.5 -> 375 volley every 2.5 s
    let trained = calculate(&pack, &build(5)).expect("calculate");
    assert_eq!(trained.result.alpha, 375.0);
    assert_eq!(trained.result.dps_total, 150.0);

    let partial = calculate(&pack, &build(3)).expect("calculate");
    assert_eq!(partial.result.alpha, 345.0);
    assert_eq!(partial.result.dps_total, 138.0);

    // The gatling requires a different skill and keeps its base multiplier.
    let gatling = calculate(&pack, &gatling_fit(&pack)).expect("calculate");
    assert_eq!(gatling.result.alpha, 150.0);
}

#[test]
fn charge_effect_modifies_its_module() {
    let pack = pack();
    let fit = Fit::builder("hail", RIFTER)
        .module(FittedModule::new(GATLING, SlotKind::High).with_charge(HAIL))
        .build(&pack)
        .expect("fit");
    let resolved = resolve(&pack, &fit).expect("resolve");

    let module = &resolved.modules[0];
    assert_eq!(module.item.attributes.get(ids::attr::RATE_OF_FIRE), Some(3750.0));
    let charge = module.charge.as_ref().expect("charge should resolve");
    assert_eq!(charge.type_id, HAIL);

    let metrics = calculate(&pack, &fit).expect("calculate");
    assert_eq!(metrics.result.alpha, 200.0);
    assert_eq!(metrics.result.dps_total, 53.3333);
}

#[test]
fn three_equal_hardeners_follow_penalty_curve() {
    let pack = pack();
    let fit = hardened_fit(&pack, &[ModuleState::Active; 3]);
    let metrics = calculate(&pack, &fit).expect("calculate");

    let m = 0.3;
    approx_eq(penalty_coefficient(1), 0.8691, 1e-4);
    approx_eq(penalty_coefficient(2), 0.5706, 1e-4);
    let combined = 1.0
        - (m * penalty_coefficient(0) + m * penalty_coefficient(1) + m * penalty_coefficient(2));
    let expected_resist = 1.0 - 0.5 * combined;
    let resist = metrics.result.resists.get(Layer::Armor, DamageType::Em);
    // Metric rounding is the only slack left.
    approx_eq(resist, expected_resist, 1e-4);

    let unpenalized = 1.0 - 0.5 * (1.0 - 3.0 * m);
    assert!((resist - unpenalized).abs() > 0.05);
}

#[test]
fn active_effects_need_an_active_module() {
    let pack = pack();

    let online = calculate(&pack, &hardened_fit(&pack, &[ModuleState::Online])).expect("calculate");
    assert_eq!(online.result.resists.get(Layer::Armor, DamageType::Em), 0.5);

    let mixed = hardened_fit(
        &pack,
        &[ModuleState::Active, ModuleState::Offline, ModuleState::Active],
    );
    let metrics = calculate(&pack, &mixed).expect("calculate");
    let expected = 1.0 - 0.5 * (1.0 - 0.3 - 0.3 * penalty_coefficient(1));
    approx_eq(
        metrics.result.resists.get(Layer::Armor, DamageType::Em),
        expected,
        1e-4,
    );
}

#[test]
fn projected_modifiers_leave_the_fit_untouched() {
    let pack = pack();
    let fit = Fit::builder("web", RIFTER)
        .module(FittedModule::new(WEBIFIER, SlotKind::Mid))
        .build(&pack)
        .expect("fit");
    let resolved = resolve(&pack, &fit).expect("resolve");

    assert_eq!(resolved.hull.attributes.get(MAX_VELOCITY), Some(365.0));
    assert_eq!(resolved.modules[0].item.attributes.get(SPEED_FACTOR), Some(-60.0));
    assert!(resolved.coverage_gaps.is_empty());
}

#[test]
fn unknown_effects_are_recorded_not_fatal() {
    let pack = pack();
    let fit = Fit::builder("prototype", RIFTER)
        .module(FittedModule::new(PROTOTYPE_MODULE, SlotKind::Low))
        .module(FittedModule::new(GATLING, SlotKind::High).with_charge(BARRAGE))
        .build(&pack)
        .expect("fit");
    let metrics = calculate(&pack, &fit).expect("calculate should still succeed");

    assert_eq!(metrics.result.dps_total, 50.0);
    assert_eq!(
        metrics.coverage_gaps,
        vec![CoverageGap::UnknownEffect {
            effect_id: UNKNOWN_EFFECT,
            source_type_id: PROTOTYPE_MODULE,
        }]
    );
}

#[test]
fn self_referencing_modifiers_terminate_with_cycle_gap() {
    let pack = pack();
    let fit = Fit::builder("loop", RIFTER)
        .module(FittedModule::new(FEEDBACK_MODULE, SlotKind::Low))
        .build(&pack)
        .expect("fit");
    let resolved = resolve(&pack, &fit).expect("resolve");

    assert!(resolved.coverage_gaps.iter().any(|gap| matches!(
        gap,
        CoverageGap::DependencyCycle {
            type_id: FEEDBACK_MODULE,
            ..
        }
    )));
    let attributes = &resolved.modules[0].item.attributes;
    assert!(attributes.get(FEEDBACK_A).is_some_and(f64::is_finite));
    assert!(attributes.get(FEEDBACK_B).is_some_and(f64::is_finite));
}

#[test]
fn drones_add_dps_but_not_alpha() {
    let pack = pack();
    let fit = Fit::builder("drones", RIFTER)
        .drone(WARRIOR, 8)
        .build(&pack)
        .expect("fit");
    let resolved = resolve(&pack, &fit).expect("resolve");
    assert_eq!(launched_drones(&resolved), vec![5]);

    let metrics = calculate(&pack, &fit).expect("calculate");
    assert_eq!(metrics.result.dps_total, 30.0);
    assert_eq!(metrics.result.alpha, 0.0);
}

#[test]
fn drone_bandwidth_caps_launch_in_fit_order() {
    let pack = pack();
    let fit = Fit::builder("mixed-drones", RIFTER)
        .drone(HAMMERHEAD, 3)
        .drone(WARRIOR, 5)
        .build(&pack)
        .expect("fit");
    let resolved = resolve(&pack, &fit).expect("resolve");
    assert_eq!(launched_drones(&resolved), vec![2, 1]);

    let metrics = calculate(&pack, &fit).expect("calculate");
    // 2 * 60 / 5 + 1 * 24 / 4
    assert_eq!(metrics.result.dps_total, 30.0);
}

#[test]
fn ehp_uses_uniform_damage_profile() {
    let pack = pack();
    let fit = Fit::builder("bare", RIFTER).build(&pack).expect("fit");
    let metrics = calculate(&pack, &fit).expect("calculate");

    // shield 400 / (1 - 0.41275), armor 350 / 0.7, hull 300 / 0.67
    approx_eq(metrics.defense.ehp_by_layer.armor, 500.0, 1e-9);
    approx_eq(metrics.defense.ehp_by_layer.hull, 300.0 / 0.67, 1e-9);
    approx_eq(metrics.result.ehp, 1628.9021, 1e-4);
}

#[test]
fn unset_hull_attributes_fall_back_to_pack_defaults() {
    let mut file = pack_file();
    for attribute in &mut file.attributes {
        if attribute.attribute_id == ids::attr::ARMOR_EXPLOSIVE_RESONANCE {
            attribute.default_value = 0.9;
        }
    }
    for type_def in &mut file.types {
        if type_def.type_id == RIFTER {
            type_def.attributes.remove(&ids::attr::ARMOR_EXPLOSIVE_RESONANCE);
        }
    }
    let pack = DataPack::from_file(file).expect("pack");
    let fit = Fit::builder("bare", RIFTER).build(&pack).expect("fit");

    let resolved = resolve(&pack, &fit).expect("resolve");
    assert_eq!(
        resolved.hull.attributes.get(ids::attr::ARMOR_EXPLOSIVE_RESONANCE),
        Some(0.9)
    );
    let metrics = calculate(&pack, &fit).expect("calculate");
    approx_eq(metrics.result.resists.get(Layer::Armor, DamageType::Explosive), 0.1, 1e-9);
}

#[test]
fn resolution_is_deterministic_and_idempotent() {
    let pack = pack();
    let fit = Fit::builder("mixed", RIFTER)
        .module(FittedModule::new(GATLING, SlotKind::High).with_charge(HAIL))
        .module(FittedModule::new(ARMOR_EM_HARDENER, SlotKind::Low))
        .module(FittedModule::new(ARMOR_EM_HARDENER, SlotKind::Low))
        .drone(HAMMERHEAD, 2)
        .build(&pack)
        .expect("fit");

    let first = resolve(&pack, &fit).expect("resolve");
    let second = resolve(&pack, &fit).expect("resolve");
    assert_eq!(first, second);
    assert_eq!(
        calculate(&pack, &fit).expect("calculate").result,
        calculate(&pack, &fit).expect("calculate").result
    );
}

proptest! {
    #[test]
    fn resists_stay_bounded_and_metrics_finite(
        resonances in proptest::collection::vec(0.0f64..1.5, 12),
        shield in 0.0f64..50_000.0,
        armor in 0.0f64..50_000.0,
        hardeners in 0usize..6,
    ) {
        let mut file = pack_file();
        let resonance_ids = [
            ids::attr::SHIELD_EM_RESONANCE,
            ids::attr::SHIELD_THERMAL_RESONANCE,
            ids::attr::SHIELD_KINETIC_RESONANCE,
            ids::attr::SHIELD_EXPLOSIVE_RESONANCE,
            ids::attr::ARMOR_EM_RESONANCE,
            ids::attr::ARMOR_THERMAL_RESONANCE,
            ids::attr::ARMOR_KINETIC_RESONANCE,
            ids::attr::ARMOR_EXPLOSIVE_RESONANCE,
            ids::attr::HULL_EM_RESONANCE,
            ids::attr::HULL_THERMAL_RESONANCE,
            ids::attr::HULL_KINETIC_RESONANCE,
            ids::attr::HULL_EXPLOSIVE_RESONANCE,
        ];
        let hull = file
            .types
            .iter_mut()
            .find(|type_def| type_def.type_id == RIFTER)
            .expect("rifter");
        for (attribute_id, value) in resonance_ids.iter().zip(&resonances) {
            hull.attributes.insert(*attribute_id, *value);
        }
        hull.attributes.insert(ids::attr::SHIELD_CAPACITY, shield);
        hull.attributes.insert(ids::attr::ARMOR_HP, armor);
        let pack = DataPack::from_file(file).expect("pack");

        let fit = (0..hardeners)
            .fold(Fit::builder("prop", RIFTER), |builder, _| {
                builder.module(FittedModule::new(ARMOR_EM_HARDENER, SlotKind::Low))
            })
            .module(FittedModule::new(GATLING, SlotKind::High).with_charge(BARRAGE))
            .build(&pack)
            .expect("fit");
        let result = calculate(&pack, &fit).expect("calculate").result;

        for layer in Layer::ALL {
            for damage_type in DamageType::ALL {
                let resist = result.resists.get(layer, damage_type);
                prop_assert!((0.0..=MAX_RESIST).contains(&resist), "{layer:?} {damage_type:?} = {resist}");
            }
        }
        prop_assert!(result.ehp.is_finite() && result.ehp >= 0.0);
        prop_assert!(result.dps_total.is_finite() && result.dps_total >= 0.0);
        prop_assert!(result.alpha.is_finite() && result.alpha >= 0.0);
    }
}
