use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::ids;
use crate::data::pack::{DataPack, TypeId};
use crate::error::FitError;

pub const DEFAULT_SKILL_LEVEL: u8 = 5;
pub const MAX_SKILL_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    High,
    Mid,
    Low,
    Rig,
    Subsystem,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Mid => "mid",
            Self::Low => "low",
            Self::Rig => "rig",
            Self::Subsystem => "subsystem",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered so that `state >= ModuleState::Online` reads naturally.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Offline,
    Online,
    #[default]
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedModule {
    pub type_id: TypeId,
    pub slot: SlotKind,
    #[serde(default)]
    pub state: ModuleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_type_id: Option<TypeId>,
}

impl FittedModule {
    pub fn new(type_id: TypeId, slot: SlotKind) -> Self {
        Self {
            type_id,
            slot,
            state: ModuleState::Active,
            charge_type_id: None,
        }
    }

    pub fn with_charge(mut self, charge_type_id: TypeId) -> Self {
        self.charge_type_id = Some(charge_type_id);
        self
    }

    pub fn with_state(mut self, state: ModuleState) -> Self {
        self.state = state;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedDrone {
    pub type_id: TypeId,
    pub quantity: u32,
    /// Requested launch count. `None` launches as many as limits allow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<u32>,
}

/// Pilot skill levels. Every skill not listed trains to `default_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProfile {
    #[serde(default = "default_skill_level")]
    pub default_level: u8,
    #[serde(default)]
    pub levels: BTreeMap<TypeId, u8>,
}

fn default_skill_level() -> u8 {
    DEFAULT_SKILL_LEVEL
}

impl Default for SkillProfile {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_SKILL_LEVEL,
            levels: BTreeMap::new(),
        }
    }
}

impl SkillProfile {
    pub fn level(&self, skill_type_id: TypeId) -> u8 {
        self.levels
            .get(&skill_type_id)
            .copied()
            .unwrap_or(self.default_level)
            .min(MAX_SKILL_LEVEL)
    }

    pub fn with_level(mut self, skill_type_id: TypeId, level: u8) -> Self {
        self.levels.insert(skill_type_id, level.min(MAX_SKILL_LEVEL));
        self
    }
}

/// A validated fit. Only [FitBuilder::build] creates one, and nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fit {
    fit_id: String,
    hull_type_id: TypeId,
    modules: Vec<FittedModule>,
    drones: Vec<FittedDrone>,
    skills: SkillProfile,
}

impl Fit {
    pub fn builder(fit_id: impl Into<String>, hull_type_id: TypeId) -> FitBuilder {
        FitBuilder {
            fit_id: fit_id.into(),
            hull_type_id,
            ..FitBuilder::default()
        }
    }

    pub fn fit_id(&self) -> &str {
        &self.fit_id
    }

    pub fn hull_type_id(&self) -> TypeId {
        self.hull_type_id
    }

    pub fn modules(&self) -> &[FittedModule] {
        &self.modules
    }

    pub fn drones(&self) -> &[FittedDrone] {
        &self.drones
    }

    pub fn skills(&self) -> &SkillProfile {
        &self.skills
    }
}

/// Raw fit input. Deserializable so fits can also arrive as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitBuilder {
    pub fit_id: String,
    #[serde(alias = "shipTypeId")]
    pub hull_type_id: TypeId,
    #[serde(default)]
    pub modules: Vec<FittedModule>,
    #[serde(default)]
    pub drones: Vec<FittedDrone>,
    #[serde(default)]
    pub skills: SkillProfile,
}

impl FitBuilder {
    pub fn module(mut self, module: FittedModule) -> Self {
        self.modules.push(module);
        self
    }

    pub fn drone(mut self, type_id: TypeId, quantity: u32) -> Self {
        self.drones.push(FittedDrone {
            type_id,
            quantity,
            active: None,
        });
        self
    }

    pub fn skills(mut self, skills: SkillProfile) -> Self {
        self.skills = skills;
        self
    }

    /// Validate every type reference against the pack and freeze the fit.
    pub fn build(self, pack: &DataPack) -> Result<Fit, FitError> {
        if self.hull_type_id == 0 {
            return Err(FitError::EmptyFit(self.fit_id));
        }
        match pack.type_def(self.hull_type_id) {
            Some(hull) if hull.category_id == ids::category::SHIP => {}
            _ => return Err(FitError::UnknownHull(self.hull_type_id)),
        }

        for (index, module) in self.modules.iter().enumerate() {
            let slot = format!("{} module[{index}]", module.slot);
            expect_category(pack, module.type_id, &slot, |category| {
                if module.slot == SlotKind::Subsystem {
                    category == ids::category::SUBSYSTEM
                } else {
                    category == ids::category::MODULE
                }
            })?;
            if let Some(charge) = module.charge_type_id {
                expect_category(pack, charge, &format!("{slot} charge"), |category| {
                    category == ids::category::CHARGE
                })?;
            }
        }

        for (index, drone) in self.drones.iter().enumerate() {
            expect_category(pack, drone.type_id, &format!("drone[{index}]"), |category| {
                category == ids::category::DRONE
            })?;
        }

        let mut skills = self.skills;
        skills.default_level = skills.default_level.min(MAX_SKILL_LEVEL);

        Ok(Fit {
            fit_id: self.fit_id,
            hull_type_id: self.hull_type_id,
            modules: self.modules,
            drones: self.drones.into_iter().filter(|d| d.quantity > 0).collect(),
            skills,
        })
    }
}

fn expect_category(
    pack: &DataPack,
    type_id: TypeId,
    slot: &str,
    accepts: impl Fn(u32) -> bool,
) -> Result<(), FitError> {
    let Some(type_def) = pack.type_def(type_id) else {
        return Err(FitError::UnknownType {
            type_id,
            slot: slot.to_string(),
        });
    };
    if accepts(type_def.category_id) {
        Ok(())
    } else {
        Err(FitError::WrongCategory {
            type_id,
            category_id: type_def.category_id,
            slot: slot.to_string(),
        })
    }
}
