//! Metric Result: the fit-level numbers compared against reference values.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::pack::TypeId;

/// Round to the four decimals metric results are stored with.
pub fn round_metric(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DamageType {
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "therm")]
    Thermal,
    #[serde(rename = "kin")]
    Kinetic,
    #[serde(rename = "exp")]
    Explosive,
}

impl DamageType {
    pub const ALL: [DamageType; 4] = [Self::Em, Self::Thermal, Self::Kinetic, Self::Explosive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Em => "em",
            Self::Thermal => "therm",
            Self::Kinetic => "kin",
            Self::Explosive => "exp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Shield,
    Armor,
    Hull,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Self::Shield, Self::Armor, Self::Hull];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shield => "shield",
            Self::Armor => "armor",
            Self::Hull => "hull",
        }
    }
}

/// Four values, one per damage type. Used for damage breakdowns and resist profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageVector {
    pub em: f64,
    pub therm: f64,
    pub kin: f64,
    pub exp: f64,
}

pub type ResistProfile = DamageVector;

impl DamageVector {
    pub const fn uniform(value: f64) -> Self {
        Self {
            em: value,
            therm: value,
            kin: value,
            exp: value,
        }
    }

    pub fn get(&self, damage_type: DamageType) -> f64 {
        match damage_type {
            DamageType::Em => self.em,
            DamageType::Thermal => self.therm,
            DamageType::Kinetic => self.kin,
            DamageType::Explosive => self.exp,
        }
    }

    pub fn get_mut(&mut self, damage_type: DamageType) -> &mut f64 {
        match damage_type {
            DamageType::Em => &mut self.em,
            DamageType::Thermal => &mut self.therm,
            DamageType::Kinetic => &mut self.kin,
            DamageType::Explosive => &mut self.exp,
        }
    }

    pub fn total(&self) -> f64 {
        self.em + self.therm + self.kin + self.exp
    }

    pub fn scaled(&self, factor: f64) -> Self {
        self.map(|value| value * factor)
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            em: f(self.em),
            therm: f(self.therm),
            kin: f(self.kin),
            exp: f(self.exp),
        }
    }

    pub fn add(&mut self, other: &DamageVector) {
        for damage_type in DamageType::ALL {
            *self.get_mut(damage_type) += other.get(damage_type);
        }
    }

    /// Weighted sum against a profile whose weights sum to one.
    pub fn weighted_by(&self, profile: &DamageVector) -> f64 {
        DamageType::ALL
            .iter()
            .map(|damage_type| self.get(*damage_type) * profile.get(*damage_type))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerResists {
    pub shield: ResistProfile,
    pub armor: ResistProfile,
    pub hull: ResistProfile,
}

impl LayerResists {
    pub fn layer(&self, layer: Layer) -> &ResistProfile {
        match layer {
            Layer::Shield => &self.shield,
            Layer::Armor => &self.armor,
            Layer::Hull => &self.hull,
        }
    }

    pub fn layer_mut(&mut self, layer: Layer) -> &mut ResistProfile {
        match layer {
            Layer::Shield => &mut self.shield,
            Layer::Armor => &mut self.armor,
            Layer::Hull => &mut self.hull,
        }
    }

    pub fn get(&self, layer: Layer, damage_type: DamageType) -> f64 {
        self.layer(layer).get(damage_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricSource {
    /// This engine.
    #[serde(rename = "app", alias = "engine")]
    Engine,
    /// The external reference tool.
    #[serde(rename = "pyfa", alias = "reference")]
    Reference,
}

/// Name of one compared metric: a scalar or a single resist cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    DpsTotal,
    Alpha,
    Ehp,
    Resist(Layer, DamageType),
}

impl MetricKey {
    pub fn all() -> Vec<MetricKey> {
        let mut keys = vec![Self::DpsTotal, Self::Alpha, Self::Ehp];
        for layer in Layer::ALL {
            for damage_type in DamageType::ALL {
                keys.push(Self::Resist(layer, damage_type));
            }
        }
        keys
    }

    pub fn is_resist(&self) -> bool {
        matches!(self, Self::Resist(..))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::all().into_iter().find(|key| key.to_string() == raw)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DpsTotal => f.write_str("dpsTotal"),
            Self::Alpha => f.write_str("alpha"),
            Self::Ehp => f.write_str("ehp"),
            Self::Resist(layer, damage_type) => {
                write!(f, "resists.{}.{}", layer.as_str(), damage_type.as_str())
            }
        }
    }
}

impl Serialize for MetricKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MetricKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MetricKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown metric '{raw}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    pub fit_id: String,
    pub ship_type_id: TypeId,
    pub source: MetricSource,
    pub sde_version: String,
    pub dps_total: f64,
    pub alpha: f64,
    pub ehp: f64,
    pub resists: LayerResists,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl MetricResult {
    pub fn value(&self, key: MetricKey) -> f64 {
        match key {
            MetricKey::DpsTotal => self.dps_total,
            MetricKey::Alpha => self.alpha,
            MetricKey::Ehp => self.ehp,
            MetricKey::Resist(layer, damage_type) => self.resists.get(layer, damage_type),
        }
    }

    /// Copy with every value rounded to stored precision.
    pub fn rounded(mut self) -> Self {
        self.dps_total = round_metric(self.dps_total);
        self.alpha = round_metric(self.alpha);
        self.ehp = round_metric(self.ehp);
        for layer in Layer::ALL {
            let profile = self.resists.layer_mut(layer);
            *profile = profile.map(round_metric);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_keys_render_dotted_paths() {
        assert_eq!(MetricKey::DpsTotal.to_string(), "dpsTotal");
        assert_eq!(
            MetricKey::Resist(Layer::Armor, DamageType::Thermal).to_string(),
            "resists.armor.therm"
        );
        assert_eq!(
            MetricKey::parse("resists.hull.exp"),
            Some(MetricKey::Resist(Layer::Hull, DamageType::Explosive))
        );
        assert_eq!(MetricKey::all().len(), 15);
    }

    #[test]
    fn rounding_settles_float_noise() {
        assert_eq!(round_metric(1.0 - 0.81), 0.19);
        assert_eq!(round_metric(49.999_999_9), 50.0);
    }

    #[test]
    fn metric_result_uses_external_field_names() {
        let raw = r#"{
            "fitId": "f1", "shipTypeId": 587, "source": "pyfa", "sdeVersion": "sde-1",
            "dpsTotal": 100.0, "alpha": 300.0, "ehp": 5000.0,
            "resists": {
                "shield": {"em": 0.0, "therm": 0.2, "kin": 0.4, "exp": 0.5},
                "armor": {"em": 0.5, "therm": 0.45, "kin": 0.25, "exp": 0.1},
                "hull": {"em": 0.33, "therm": 0.33, "kin": 0.33, "exp": 0.33}
            }
        }"#;
        let parsed: MetricResult = serde_json::from_str(raw).expect("metric result should parse");
        assert_eq!(parsed.source, MetricSource::Reference);
        assert_eq!(parsed.value(MetricKey::Resist(Layer::Shield, DamageType::Kinetic)), 0.4);
    }
}
