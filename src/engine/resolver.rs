//! Attribute resolution for a single fit.
//!
//! Every fitted item, loaded charge, drone stack and pack skill becomes an
//! item instance. Effects on those instances bind modifiers to (item,
//! attribute) targets; values are then evaluated lazily so a modifier reads
//! its source attribute *after* that attribute's own modifiers. Resolution is
//! a pure function of the pack and the fit.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::trace;

use crate::data::ids;
use crate::data::pack::{
    AttributeId, DataPack, Domain, EffectCategory, EffectId, Modifier, Operation, TypeDef, TypeId,
};
use crate::engine::coverage::{CoverageGap, CoverageLedger};
use crate::engine::stacking::{ApplyOrder, ModifierStack, StackContribution};
use crate::error::FitError;
use crate::fit::model::{Fit, ModuleState, SlotKind};

const HULL_INDEX: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    Hull,
    Module,
    Charge,
    Drone,
    Skill,
}

/// Final attribute values of one item, keyed by attribute ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedAttributeSet {
    values: BTreeMap<AttributeId, f64>,
}

impl ResolvedAttributeSet {
    pub fn get(&self, attribute_id: AttributeId) -> Option<f64> {
        self.values.get(&attribute_id).copied()
    }

    pub fn get_or(&self, attribute_id: AttributeId, fallback: f64) -> f64 {
        self.get(attribute_id).unwrap_or(fallback)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeId, f64)> + '_ {
        self.values.iter().map(|(id, value)| (*id, *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(AttributeId, f64)> for ResolvedAttributeSet {
    fn from_iter<I: IntoIterator<Item = (AttributeId, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedItem {
    pub type_id: TypeId,
    pub role: ItemRole,
    pub attributes: ResolvedAttributeSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedModule {
    pub item: ResolvedItem,
    pub slot: SlotKind,
    pub state: ModuleState,
    pub charge: Option<ResolvedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDrone {
    pub item: ResolvedItem,
    pub quantity: u32,
    pub requested_active: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFit {
    pub fit_id: String,
    pub hull: ResolvedItem,
    pub modules: Vec<ResolvedModule>,
    pub drones: Vec<ResolvedDrone>,
    pub coverage_gaps: Vec<CoverageGap>,
}

struct Instance<'a> {
    type_def: &'a TypeDef,
    role: ItemRole,
    state: ModuleState,
    other: Option<usize>,
    skill_level: u8,
}

#[derive(Clone, Copy)]
struct Bound<'a> {
    source: usize,
    effect_id: EffectId,
    modifier_index: usize,
    modifier: &'a Modifier,
}

struct Resolver<'a> {
    pack: &'a DataPack,
    fit: &'a Fit,
    items: Vec<Instance<'a>>,
    incoming: HashMap<(usize, AttributeId), Vec<Bound<'a>>>,
    cache: HashMap<(usize, AttributeId), f64>,
    in_progress: HashSet<(usize, AttributeId)>,
    ledger: CoverageLedger,
}

fn effect_applies(category: EffectCategory, state: ModuleState) -> bool {
    match category {
        EffectCategory::OnFit => true,
        EffectCategory::Passive => state >= ModuleState::Online,
        EffectCategory::Active => state == ModuleState::Active,
    }
}

fn lookup<'a>(pack: &'a DataPack, type_id: TypeId, slot: &str) -> Result<&'a TypeDef, FitError> {
    pack.type_def(type_id).ok_or_else(|| FitError::UnknownType {
        type_id,
        slot: slot.to_string(),
    })
}

impl<'a> Resolver<'a> {
    fn new(pack: &'a DataPack, fit: &'a Fit) -> Result<Self, FitError> {
        let hull = pack
            .type_def(fit.hull_type_id())
            .ok_or(FitError::UnknownHull(fit.hull_type_id()))?;
        let mut items = vec![Instance {
            type_def: hull,
            role: ItemRole::Hull,
            state: ModuleState::Active,
            other: None,
            skill_level: 0,
        }];

        for (index, module) in fit.modules().iter().enumerate() {
            let module_index = items.len();
            items.push(Instance {
                type_def: lookup(pack, module.type_id, &format!("module[{index}]"))?,
                role: ItemRole::Module,
                state: module.state,
                other: None,
                skill_level: 0,
            });
            if let Some(charge_id) = module.charge_type_id {
                let charge_index = items.len();
                items.push(Instance {
                    type_def: lookup(pack, charge_id, &format!("module[{index}] charge"))?,
                    role: ItemRole::Charge,
                    state: module.state,
                    other: Some(module_index),
                    skill_level: 0,
                });
                items[module_index].other = Some(charge_index);
            }
        }

        for (index, drone) in fit.drones().iter().enumerate() {
            items.push(Instance {
                type_def: lookup(pack, drone.type_id, &format!("drone[{index}]"))?,
                role: ItemRole::Drone,
                state: ModuleState::Active,
                other: None,
                skill_level: 0,
            });
        }

        for skill_id in pack.skill_type_ids() {
            let Some(skill) = pack.type_def(*skill_id) else {
                continue;
            };
            if skill.effects.is_empty() {
                continue;
            }
            items.push(Instance {
                type_def: skill,
                role: ItemRole::Skill,
                state: ModuleState::Active,
                other: None,
                skill_level: fit.skills().level(*skill_id),
            });
        }

        let mut resolver = Self {
            pack,
            fit,
            items,
            incoming: HashMap::new(),
            cache: HashMap::new(),
            in_progress: HashSet::new(),
            ledger: CoverageLedger::default(),
        };
        resolver.bind_modifiers();
        Ok(resolver)
    }

    fn bind_modifiers(&mut self) {
        let pack = self.pack;
        for source in 0..self.items.len() {
            let type_def = self.items[source].type_def;
            let state = self.items[source].state;
            for effect_id in &type_def.effects {
                let Some(effect) = pack.effect(*effect_id) else {
                    self.ledger.record(CoverageGap::UnknownEffect {
                        effect_id: *effect_id,
                        source_type_id: type_def.type_id,
                    });
                    continue;
                };
                if !effect_applies(effect.category, state) {
                    continue;
                }
                for (modifier_index, modifier) in effect.modifiers.iter().enumerate() {
                    if !self.attributes_known(effect.effect_id, modifier) {
                        continue;
                    }
                    let bound = Bound {
                        source,
                        effect_id: effect.effect_id,
                        modifier_index,
                        modifier,
                    };
                    for target in self.targets(source, modifier) {
                        self.incoming
                            .entry((target, modifier.target_attribute_id))
                            .or_default()
                            .push(bound);
                    }
                }
            }
        }
        for bound in self.incoming.values_mut() {
            bound.sort_by_key(|b| (b.effect_id, b.source, b.modifier_index));
        }
    }

    fn attributes_known(&mut self, effect_id: EffectId, modifier: &Modifier) -> bool {
        let mut known = true;
        for attribute_id in [modifier.target_attribute_id, modifier.source_attribute_id] {
            if self.pack.attribute(attribute_id).is_none() {
                self.ledger.record(CoverageGap::UnknownAttribute {
                    attribute_id,
                    effect_id,
                });
                known = false;
            }
        }
        known
    }

    fn targets(&self, source: usize, modifier: &Modifier) -> Vec<usize> {
        match modifier.domain {
            Domain::Item => vec![source],
            Domain::Ship => vec![HULL_INDEX],
            Domain::Other => self.items[source].other.into_iter().collect(),
            Domain::Group => {
                let Some(filter) = modifier.filter.as_ref() else {
                    return Vec::new();
                };
                self.items
                    .iter()
                    .enumerate()
                    .filter(|(index, item)| {
                        *index != source
                            && !matches!(item.role, ItemRole::Hull | ItemRole::Skill)
                            && filter.matches(item.type_def)
                    })
                    .map(|(index, _)| index)
                    .collect()
            }
            Domain::Target => Vec::new(),
        }
    }

    fn base_value(&self, item: usize, attribute_id: AttributeId) -> f64 {
        self.items[item]
            .type_def
            .attributes
            .get(&attribute_id)
            .copied()
            .or_else(|| self.pack.attribute(attribute_id).map(|a| a.default_value))
            .unwrap_or(0.0)
    }

    fn penalty_group(&self, bound: &Bound<'a>, target_attribute: AttributeId) -> Option<&'a str> {
        let source_category = self.items[bound.source].type_def.category_id;
        if ids::category::PENALTY_EXEMPT.contains(&source_category) {
            return None;
        }
        let pack = self.pack;
        pack.attribute(target_attribute)
            .and_then(|attribute| attribute.stacking_group.as_deref())
    }

    fn skill_level(&self, bound: &Bound<'a>) -> u8 {
        if bound.modifier.operation != Operation::SkillScaled {
            return 0;
        }
        let source = &self.items[bound.source];
        match bound.modifier.skill_type_id {
            Some(skill_id) => self.fit.skills().level(skill_id),
            None if source.role == ItemRole::Skill => source.skill_level,
            None => self.fit.skills().default_level,
        }
    }

    fn value(&mut self, item: usize, attribute_id: AttributeId) -> f64 {
        let key = (item, attribute_id);
        if let Some(value) = self.cache.get(&key) {
            return *value;
        }
        let base = self.base_value(item, attribute_id);
        if !self.in_progress.insert(key) {
            self.ledger.record(CoverageGap::DependencyCycle {
                type_id: self.items[item].type_def.type_id,
                attribute_id,
            });
            return base;
        }

        let bound = self.incoming.get(&key).cloned().unwrap_or_default();
        let mut stack = ModifierStack::new();
        for modifier in &bound {
            let source_value = self.value(modifier.source, modifier.modifier.source_attribute_id);
            stack.add(StackContribution::from_operation(
                ApplyOrder {
                    effect_id: modifier.effect_id,
                    source_index: modifier.source,
                    modifier_index: modifier.modifier_index,
                },
                modifier.modifier.operation,
                source_value,
                self.skill_level(modifier),
                self.penalty_group(modifier, attribute_id),
            ));
        }
        let value = stack.compose(base);
        trace!(item, attribute_id, base, value, modifiers = bound.len(), "resolved");

        self.in_progress.remove(&key);
        self.cache.insert(key, value);
        value
    }

    fn resolve_item(&mut self, item: usize) -> ResolvedItem {
        let instance = &self.items[item];
        let type_id = instance.type_def.type_id;
        let role = instance.role;
        let mut attribute_ids: BTreeSet<AttributeId> =
            instance.type_def.attributes.keys().copied().collect();
        attribute_ids.extend(
            self.incoming
                .keys()
                .filter(|(target, _)| *target == item)
                .map(|(_, attribute_id)| *attribute_id),
        );
        let pack = self.pack;
        attribute_ids.extend(
            ids::attr::AGGREGATED
                .into_iter()
                .filter(|attribute_id| pack.attribute(*attribute_id).is_some()),
        );

        let attributes = attribute_ids
            .into_iter()
            .map(|attribute_id| (attribute_id, self.value(item, attribute_id)))
            .collect();
        ResolvedItem {
            type_id,
            role,
            attributes,
        }
    }

    fn finish(mut self) -> ResolvedFit {
        let fit = self.fit;
        let hull = self.resolve_item(HULL_INDEX);

        let mut modules = Vec::with_capacity(fit.modules().len());
        let mut drones = Vec::with_capacity(fit.drones().len());
        let mut module_cursor = fit.modules().iter();
        let mut drone_cursor = fit.drones().iter();
        for index in 1..self.items.len() {
            match self.items[index].role {
                ItemRole::Module => {
                    let Some(fitted) = module_cursor.next() else {
                        continue;
                    };
                    let charge = self.items[index].other;
                    let item = self.resolve_item(index);
                    let charge = charge.map(|charge| self.resolve_item(charge));
                    modules.push(ResolvedModule {
                        item,
                        slot: fitted.slot,
                        state: fitted.state,
                        charge,
                    });
                }
                ItemRole::Drone => {
                    let Some(fitted) = drone_cursor.next() else {
                        continue;
                    };
                    let item = self.resolve_item(index);
                    drones.push(ResolvedDrone {
                        item,
                        quantity: fitted.quantity,
                        requested_active: fitted.active,
                    });
                }
                ItemRole::Hull | ItemRole::Charge | ItemRole::Skill => {}
            }
        }

        ResolvedFit {
            fit_id: fit.fit_id().to_string(),
            hull,
            modules,
            drones,
            coverage_gaps: self.ledger.into_vec(),
        }
    }
}

/// Resolve every attribute of every item in `fit`.
///
/// Unknown effects and attributes are skipped and reported in
/// [ResolvedFit::coverage_gaps]; an item type missing from the pack is a
/// [FitError].
pub fn resolve(pack: &DataPack, fit: &Fit) -> Result<ResolvedFit, FitError> {
    Ok(Resolver::new(pack, fit)?.finish())
}
