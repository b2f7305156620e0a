//! Static data pack: types, attribute definitions and effect definitions.
//!
//! The pack is produced by an external extraction step and treated as a
//! read-only input. Load it once and share it as `Arc<DataPack>` across the
//! resolver, the harness workers and the audit.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::data::ids;
use crate::error::PackError;

pub type TypeId = u32;
pub type AttributeId = u32;
pub type EffectId = u32;
pub type GroupId = u32;
pub type CategoryId = u32;

/// Normalize a type or effect name for lookup: alphanumeric lowercase only.
pub fn normalize_lookup(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDef {
    pub type_id: TypeId,
    pub name: String,
    #[serde(default)]
    pub group_id: GroupId,
    pub category_id: CategoryId,
    /// Base attribute values keyed by attribute ID.
    #[serde(default)]
    pub attributes: BTreeMap<AttributeId, f64>,
    #[serde(default)]
    pub effects: Vec<EffectId>,
}

impl TypeDef {
    pub fn has_effect(&self, effect_id: EffectId) -> bool {
        self.effects.contains(&effect_id)
    }

    /// Skill type IDs listed in the `requiredSkill1..3` attributes.
    pub fn required_skills(&self) -> impl Iterator<Item = TypeId> + '_ {
        [
            ids::attr::REQUIRED_SKILL_1,
            ids::attr::REQUIRED_SKILL_2,
            ids::attr::REQUIRED_SKILL_3,
        ]
        .into_iter()
        .filter_map(|attr| self.attributes.get(&attr))
        .filter(|value| value.is_finite() && **value > 0.0)
        .map(|value| *value as TypeId)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    pub attribute_id: AttributeId,
    pub name: String,
    #[serde(default)]
    pub default_value: f64,
    #[serde(default = "default_high_is_good")]
    pub high_is_good: bool,
    /// Penalty group; `None` means modifiers on this attribute never stack-penalize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacking_group: Option<String>,
}

fn default_high_is_good() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectCategory {
    /// Applies while the carrier is at least online.
    Passive,
    /// Applies only while the carrier is active.
    Active,
    /// Applies whenever the carrier is fitted, even offline.
    OnFit,
}

/// Which items a modifier reaches, relative to the item carrying the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Domain {
    #[serde(rename = "self")]
    Item,
    Ship,
    /// Module for a charge, charge for a module.
    Other,
    /// Every other fitted item matching the modifier's filter.
    Group,
    /// Projected onto a target. Outside the resolver's scope.
    Target,
}

/// Modifier operation. Closed set: new data must map onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    PreAssign,
    PreMul,
    PrePercent,
    ModAdd,
    PostPercent,
    PostMul,
    PostAssign,
    /// Post percentage whose magnitude is the source value times a skill level.
    SkillScaled,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreAssign => "preAssign",
            Self::PreMul => "preMul",
            Self::PrePercent => "prePercent",
            Self::ModAdd => "modAdd",
            Self::PostPercent => "postPercent",
            Self::PostMul => "postMul",
            Self::PostAssign => "postAssign",
            Self::SkillScaled => "skillScaled",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_skill_id: Option<TypeId>,
}

impl ItemFilter {
    pub fn is_empty(&self) -> bool {
        self.group_id.is_none() && self.category_id.is_none() && self.required_skill_id.is_none()
    }

    /// All present criteria must hold. An empty filter matches nothing.
    pub fn matches(&self, type_def: &TypeDef) -> bool {
        if self.is_empty() {
            return false;
        }
        self.group_id.map_or(true, |id| id == type_def.group_id)
            && self
                .category_id
                .map_or(true, |id| id == type_def.category_id)
            && self
                .required_skill_id
                .map_or(true, |id| type_def.required_skills().any(|skill| skill == id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ItemFilter>,
    pub target_attribute_id: AttributeId,
    pub source_attribute_id: AttributeId,
    pub operation: Operation,
    /// Skill whose level scales a `skillScaled` modifier. Defaults to the source item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_type_id: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectDef {
    pub effect_id: EffectId,
    pub name: String,
    pub category: EffectCategory,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedId {
    pub id: u32,
    pub name: String,
}

/// On-disk pack layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackFile {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub source: String,
    pub sde_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub effects: Vec<EffectDef>,
    #[serde(default)]
    pub groups: Vec<NamedId>,
    #[serde(default)]
    pub categories: Vec<NamedId>,
}

fn default_format_version() -> u32 {
    1
}

impl PackFile {
    pub fn new(sde_version: impl Into<String>) -> Self {
        Self {
            format_version: default_format_version(),
            source: String::new(),
            sde_version: sde_version.into(),
            generated_at: None,
            types: Vec::new(),
            attributes: Vec::new(),
            effects: Vec::new(),
            groups: Vec::new(),
            categories: Vec::new(),
        }
    }
}

/// Read-only indexed pack shared by every consumer.
#[derive(Debug, Clone)]
pub struct DataPack {
    sde_version: String,
    source: String,
    types: HashMap<TypeId, TypeDef>,
    attributes: HashMap<AttributeId, AttributeDef>,
    effects: HashMap<EffectId, EffectDef>,
    type_by_name: HashMap<String, TypeId>,
    effect_by_name: HashMap<String, EffectId>,
    group_names: HashMap<GroupId, String>,
    category_names: HashMap<CategoryId, String>,
    skill_types: Vec<TypeId>,
}

impl DataPack {
    /// Index a pack file. Duplicate IDs in any table are rejected.
    pub fn from_file(file: PackFile) -> Result<Self, PackError> {
        let mut types = HashMap::with_capacity(file.types.len());
        let mut type_by_name = HashMap::with_capacity(file.types.len());
        let mut skill_types = Vec::new();
        for type_def in file.types {
            if type_def.category_id == ids::category::SKILL {
                skill_types.push(type_def.type_id);
            }
            type_by_name
                .entry(normalize_lookup(&type_def.name))
                .or_insert(type_def.type_id);
            let id = type_def.type_id;
            if types.insert(id, type_def).is_some() {
                return Err(PackError::DuplicateId { table: "types", id });
            }
        }
        skill_types.sort_unstable();

        let mut attributes = HashMap::with_capacity(file.attributes.len());
        for attribute in file.attributes {
            let id = attribute.attribute_id;
            if attributes.insert(id, attribute).is_some() {
                return Err(PackError::DuplicateId {
                    table: "attributes",
                    id,
                });
            }
        }

        let mut effects = HashMap::with_capacity(file.effects.len());
        let mut effect_by_name = HashMap::with_capacity(file.effects.len());
        for effect in file.effects {
            let id = effect.effect_id;
            effect_by_name.insert(normalize_lookup(&effect.name), id);
            if effects.insert(id, effect).is_some() {
                return Err(PackError::DuplicateId { table: "effects", id });
            }
        }

        Ok(Self {
            sde_version: file.sde_version,
            source: file.source,
            types,
            attributes,
            effects,
            type_by_name,
            effect_by_name,
            group_names: file.groups.into_iter().map(|g| (g.id, g.name)).collect(),
            category_names: file
                .categories
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect(),
            skill_types,
        })
    }

    pub fn sde_version(&self) -> &str {
        &self.sde_version
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn type_def(&self, type_id: TypeId) -> Option<&TypeDef> {
        self.types.get(&type_id)
    }

    pub fn attribute(&self, attribute_id: AttributeId) -> Option<&AttributeDef> {
        self.attributes.get(&attribute_id)
    }

    pub fn effect(&self, effect_id: EffectId) -> Option<&EffectDef> {
        self.effects.get(&effect_id)
    }

    pub fn type_by_name(&self, name: &str) -> Option<&TypeDef> {
        self.type_by_name
            .get(&normalize_lookup(name))
            .and_then(|id| self.types.get(id))
    }

    pub fn effect_by_name(&self, name: &str) -> Option<&EffectDef> {
        self.effect_by_name
            .get(&normalize_lookup(name))
            .and_then(|id| self.effects.get(id))
    }

    pub fn group_name(&self, group_id: GroupId) -> Option<&str> {
        self.group_names.get(&group_id).map(String::as_str)
    }

    pub fn category_name(&self, category_id: CategoryId) -> Option<&str> {
        self.category_names.get(&category_id).map(String::as_str)
    }

    /// Every skill type in the pack, ascending.
    pub fn skill_type_ids(&self) -> &[TypeId] {
        &self.skill_types
    }

    /// Types sorted by ID, for deterministic scans.
    pub fn types_sorted(&self) -> Vec<&TypeDef> {
        let mut all: Vec<&TypeDef> = self.types.values().collect();
        all.sort_by_key(|type_def| type_def.type_id);
        all
    }

    pub fn effects_sorted(&self) -> Vec<&EffectDef> {
        let mut all: Vec<&EffectDef> = self.effects.values().collect();
        all.sort_by_key(|effect| effect.effect_id);
        all
    }

    pub fn attributes_sorted(&self) -> Vec<&AttributeDef> {
        let mut all: Vec<&AttributeDef> = self.attributes.values().collect();
        all.sort_by_key(|attribute| attribute.attribute_id);
        all
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}
