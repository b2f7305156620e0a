//! Damage output: per-weapon volleys, sustained DPS and alpha.

use serde::Serialize;
use tracing::debug;

use crate::data::ids;
use crate::data::pack::{DataPack, TypeId};
use crate::engine::metrics::{DamageType, DamageVector};
use crate::engine::resolver::{ResolvedFit, ResolvedItem};
use crate::fit::model::ModuleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponKind {
    Turret,
    Launcher,
    Drone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponContribution {
    pub type_id: TypeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_type_id: Option<TypeId>,
    pub kind: WeaponKind,
    /// Launched drones for drone stacks, 1 for modules.
    pub count: u32,
    /// Damage of one cycle of one unit.
    pub volley: DamageVector,
    pub cycle_seconds: f64,
    pub dps: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenseSummary {
    pub weapons: Vec<WeaponContribution>,
    /// Sustained damage per second by damage type, drones included.
    pub dps: DamageVector,
    /// Damage of one simultaneous volley by damage type, drones excluded.
    pub volley: DamageVector,
    pub dps_total: f64,
    pub alpha: f64,
}

fn damage_of(item: &ResolvedItem) -> DamageVector {
    let mut damage = DamageVector::default();
    for (damage_type, attribute_id) in [
        (DamageType::Em, ids::attr::EM_DAMAGE),
        (DamageType::Thermal, ids::attr::THERMAL_DAMAGE),
        (DamageType::Kinetic, ids::attr::KINETIC_DAMAGE),
        (DamageType::Explosive, ids::attr::EXPLOSIVE_DAMAGE),
    ] {
        *damage.get_mut(damage_type) = item.attributes.get_or(attribute_id, 0.0).max(0.0);
    }
    damage
}

fn cycle_seconds(item: &ResolvedItem) -> Option<f64> {
    let millis = item.attributes.get(ids::attr::RATE_OF_FIRE)?;
    (millis.is_finite() && millis > 0.0).then_some(millis / 1000.0)
}

fn weapon_kind(pack: &DataPack, type_id: TypeId) -> Option<WeaponKind> {
    let type_def = pack.type_def(type_id)?;
    if type_def.has_effect(ids::effect::TURRET_FITTED) {
        Some(WeaponKind::Turret)
    } else if type_def.has_effect(ids::effect::LAUNCHER_FITTED) {
        Some(WeaponKind::Launcher)
    } else {
        None
    }
}

/// Launch counts per drone stack, capped by the simultaneous-drone limit and
/// the hull's drone bandwidth, in fit order.
pub fn launched_drones(resolved: &ResolvedFit) -> Vec<u32> {
    let mut slots_left = ids::MAX_ACTIVE_DRONES;
    let mut bandwidth_left = resolved
        .hull
        .attributes
        .get_or(ids::attr::DRONE_BANDWIDTH, 0.0)
        .max(0.0);

    resolved
        .drones
        .iter()
        .map(|drone| {
            let requested = drone.requested_active.unwrap_or(drone.quantity).min(drone.quantity);
            let per_drone = drone
                .item
                .attributes
                .get_or(ids::attr::DRONE_BANDWIDTH_USED, 0.0);
            let by_bandwidth = if per_drone > 0.0 {
                (bandwidth_left / per_drone).floor() as u32
            } else {
                u32::MAX
            };
            let launched = requested.min(slots_left).min(by_bandwidth);
            slots_left -= launched;
            if per_drone > 0.0 {
                bandwidth_left -= f64::from(launched) * per_drone;
            }
            launched
        })
        .collect()
}

/// Sum weapon and drone damage over a resolved fit.
///
/// Module volley is the loaded charge's damage (or the module's own, when it
/// carries no charge) times the module's damage multiplier. Drones add to
/// DPS only.
pub fn aggregate_offense(pack: &DataPack, resolved: &ResolvedFit) -> OffenseSummary {
    let mut summary = OffenseSummary::default();

    for module in &resolved.modules {
        if module.state != ModuleState::Active {
            continue;
        }
        let Some(kind) = weapon_kind(pack, module.item.type_id) else {
            continue;
        };
        let damage_source = module.charge.as_ref().unwrap_or(&module.item);
        let multiplier = module
            .item
            .attributes
            .get_or(ids::attr::DAMAGE_MULTIPLIER, 1.0);
        let volley = damage_of(damage_source).scaled(multiplier);
        if volley.total() <= 0.0 {
            continue;
        }
        let Some(cycle) = cycle_seconds(&module.item) else {
            debug!(type_id = module.item.type_id, "weapon without rate of fire skipped");
            continue;
        };

        summary.volley.add(&volley);
        summary.dps.add(&volley.scaled(1.0 / cycle));
        summary.weapons.push(WeaponContribution {
            type_id: module.item.type_id,
            charge_type_id: module.charge.as_ref().map(|charge| charge.type_id),
            kind,
            count: 1,
            volley,
            cycle_seconds: cycle,
            dps: volley.total() / cycle,
        });
    }

    for (drone, launched) in resolved.drones.iter().zip(launched_drones(resolved)) {
        if launched == 0 {
            continue;
        }
        let multiplier = drone.item.attributes.get_or(ids::attr::DAMAGE_MULTIPLIER, 1.0);
        let volley = damage_of(&drone.item).scaled(multiplier);
        let Some(cycle) = cycle_seconds(&drone.item) else {
            continue;
        };
        if volley.total() <= 0.0 {
            continue;
        }
        let stack_dps = volley.scaled(f64::from(launched) / cycle);
        summary.dps.add(&stack_dps);
        summary.weapons.push(WeaponContribution {
            type_id: drone.item.type_id,
            charge_type_id: None,
            kind: WeaponKind::Drone,
            count: launched,
            volley,
            cycle_seconds: cycle,
            dps: stack_dps.total(),
        });
    }

    summary.dps_total = summary.dps.total();
    summary.alpha = summary.volley.total();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::resolver::{ItemRole, ResolvedDrone};

    fn item(type_id: TypeId, role: ItemRole, attributes: &[(u32, f64)]) -> ResolvedItem {
        ResolvedItem {
            type_id,
            role,
            attributes: attributes.iter().copied().collect(),
        }
    }

    fn fit_with_drones(bandwidth: f64, drones: &[(f64, u32, Option<u32>)]) -> ResolvedFit {
        ResolvedFit {
            fit_id: "drones".to_string(),
            hull: item(1, ItemRole::Hull, &[(ids::attr::DRONE_BANDWIDTH, bandwidth)]),
            modules: Vec::new(),
            drones: drones
                .iter()
                .enumerate()
                .map(|(index, &(per_drone, quantity, requested_active))| ResolvedDrone {
                    item: item(
                        100 + index as TypeId,
                        ItemRole::Drone,
                        &[(ids::attr::DRONE_BANDWIDTH_USED, per_drone)],
                    ),
                    quantity,
                    requested_active,
                })
                .collect(),
            coverage_gaps: Vec::new(),
        }
    }

    #[test]
    fn launch_cap_applies_across_stacks() {
        let resolved = fit_with_drones(1000.0, &[(5.0, 3, None), (5.0, 4, None)]);
        assert_eq!(launched_drones(&resolved), vec![3, 2]);
    }

    #[test]
    fn bandwidth_limits_heavy_drones_first_in_fit_order() {
        let resolved = fit_with_drones(25.0, &[(25.0, 2, None), (5.0, 5, None)]);
        assert_eq!(launched_drones(&resolved), vec![1, 0]);
    }

    #[test]
    fn requested_active_count_is_respected() {
        let resolved = fit_with_drones(50.0, &[(10.0, 5, Some(2)), (5.0, 5, None)]);
        assert_eq!(launched_drones(&resolved), vec![2, 3]);
    }

    #[test]
    fn hull_without_bandwidth_launches_nothing() {
        let resolved = fit_with_drones(0.0, &[(5.0, 5, None)]);
        assert_eq!(launched_drones(&resolved), vec![0]);
    }
}
