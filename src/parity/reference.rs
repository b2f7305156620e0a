//! Reference store: append-only log of reference results from the external tool.
//!
//! Each line of the log is a [ReferenceRevision], a partial Metric Result.
//! The current view of a fit folds its revisions in log order, last write
//! wins per field (resist cells individually).

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::pack::TypeId;
use crate::engine::metrics::{
    round_metric, DamageType, Layer, LayerResists, MetricResult, MetricSource,
};
use crate::error::HarnessError;

pub const DEFAULT_REFERENCE_PATH: &str = "data/parity/reference-results.jsonl";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub em: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
}

impl PartialProfile {
    fn cell_mut(&mut self, damage_type: DamageType) -> &mut Option<f64> {
        match damage_type {
            DamageType::Em => &mut self.em,
            DamageType::Thermal => &mut self.therm,
            DamageType::Kinetic => &mut self.kin,
            DamageType::Explosive => &mut self.exp,
        }
    }

    fn cell(&self, damage_type: DamageType) -> Option<f64> {
        match damage_type {
            DamageType::Em => self.em,
            DamageType::Thermal => self.therm,
            DamageType::Kinetic => self.kin,
            DamageType::Explosive => self.exp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialResists {
    #[serde(default)]
    pub shield: PartialProfile,
    #[serde(default)]
    pub armor: PartialProfile,
    #[serde(default)]
    pub hull: PartialProfile,
}

impl PartialResists {
    fn layer_mut(&mut self, layer: Layer) -> &mut PartialProfile {
        match layer {
            Layer::Shield => &mut self.shield,
            Layer::Armor => &mut self.armor,
            Layer::Hull => &mut self.hull,
        }
    }

    fn layer(&self, layer: Layer) -> &PartialProfile {
        match layer {
            Layer::Shield => &self.shield,
            Layer::Armor => &self.armor,
            Layer::Hull => &self.hull,
        }
    }

    fn from_resists(resists: &LayerResists) -> Self {
        let mut partial = Self::default();
        for layer in Layer::ALL {
            for damage_type in DamageType::ALL {
                *partial.layer_mut(layer).cell_mut(damage_type) =
                    Some(resists.get(layer, damage_type));
            }
        }
        partial
    }

    fn complete(&self) -> Option<LayerResists> {
        let mut resists = LayerResists::default();
        for layer in Layer::ALL {
            for damage_type in DamageType::ALL {
                *resists.layer_mut(layer).get_mut(damage_type) =
                    self.layer(layer).cell(damage_type)?;
            }
        }
        Some(resists)
    }
}

/// One imported (possibly partial) reference row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRevision {
    #[serde(default)]
    pub fit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_type_id: Option<TypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MetricSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sde_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dps_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ehp: Option<f64>,
    #[serde(default)]
    pub resists: PartialResists,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<String>,
}

fn overwrite<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl ReferenceRevision {
    pub fn from_result(result: &MetricResult, method: &str) -> Self {
        Self {
            fit_id: result.fit_id.clone(),
            ship_type_id: Some(result.ship_type_id),
            source: Some(result.source),
            sde_version: Some(result.sde_version.clone()),
            dps_total: Some(result.dps_total),
            alpha: Some(result.alpha),
            ehp: Some(result.ehp),
            resists: PartialResists::from_resists(&result.resists),
            reference_method: Some(method.to_string()),
            imported_at: None,
        }
    }

    /// Copy with every present value rounded to stored precision.
    pub fn rounded(mut self) -> Self {
        for value in [&mut self.dps_total, &mut self.alpha, &mut self.ehp]
            .into_iter()
            .flatten()
        {
            *value = round_metric(*value);
        }
        for layer in Layer::ALL {
            for damage_type in DamageType::ALL {
                if let Some(value) = self.resists.layer_mut(layer).cell_mut(damage_type) {
                    *value = round_metric(*value);
                }
            }
        }
        self
    }

    fn merge_from(&mut self, newer: &ReferenceRevision) {
        overwrite(&mut self.ship_type_id, &newer.ship_type_id);
        overwrite(&mut self.source, &newer.source);
        overwrite(&mut self.sde_version, &newer.sde_version);
        overwrite(&mut self.dps_total, &newer.dps_total);
        overwrite(&mut self.alpha, &newer.alpha);
        overwrite(&mut self.ehp, &newer.ehp);
        overwrite(&mut self.reference_method, &newer.reference_method);
        overwrite(&mut self.imported_at, &newer.imported_at);
        for layer in Layer::ALL {
            for damage_type in DamageType::ALL {
                let value = newer.resists.layer(layer).cell(damage_type);
                overwrite(self.resists.layer_mut(layer).cell_mut(damage_type), &value);
            }
        }
    }

    /// The full Metric Result, if every field has been supplied.
    pub fn to_result(&self) -> Option<MetricResult> {
        let mut metadata = BTreeMap::new();
        if let Some(method) = &self.reference_method {
            metadata.insert("referenceMethod".to_string(), method.clone().into());
        }
        if let Some(imported_at) = &self.imported_at {
            metadata.insert("importedAt".to_string(), imported_at.clone().into());
        }
        Some(MetricResult {
            fit_id: self.fit_id.clone(),
            ship_type_id: self.ship_type_id?,
            source: self.source.unwrap_or(MetricSource::Reference),
            sde_version: self.sde_version.clone()?,
            dps_total: self.dps_total?,
            alpha: self.alpha?,
            ehp: self.ehp?,
            resists: self.resists.complete()?,
            metadata,
        })
    }
}

/// Rows accepted by `import-refs`: a bare array or `{ "fits": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImportDocument {
    Wrapped { fits: Vec<ReferenceRevision> },
    List(Vec<ReferenceRevision>),
}

impl ImportDocument {
    pub fn into_rows(self) -> Vec<ReferenceRevision> {
        match self {
            Self::Wrapped { fits } => fits,
            Self::List(rows) => rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceLookup {
    Found(MetricResult),
    Missing,
    /// Revisions exist but some metric was never supplied.
    Incomplete,
    Stale { found_version: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub new_fits: usize,
    pub updated_fits: usize,
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    path: Option<PathBuf>,
    log_len: usize,
    merged: BTreeMap<String, ReferenceRevision>,
}

impl ReferenceStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a JSONL log. A missing file is an empty store that will be created on append.
    pub fn open(path: &Path) -> Result<Self, HarnessError> {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if !path.exists() {
            debug!(path = %path.display(), "no reference log, starting empty");
            return Ok(store);
        }
        let raw = fs::read_to_string(path).map_err(|err| HarnessError::io(path, err))?;
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let revision: ReferenceRevision = serde_json::from_str(line)
                .map_err(|err| HarnessError::json(path, index + 1, err))?;
            store.fold(&revision);
        }
        info!(
            path = %path.display(),
            revisions = store.log_len,
            fits = store.merged.len(),
            "loaded reference store"
        );
        Ok(store)
    }

    fn fold(&mut self, revision: &ReferenceRevision) -> bool {
        self.log_len += 1;
        match self.merged.get_mut(&revision.fit_id) {
            Some(current) => {
                current.merge_from(revision);
                false
            }
            None => {
                self.merged.insert(revision.fit_id.clone(), revision.clone());
                true
            }
        }
    }

    /// Append one revision to the log and fold it into the current view.
    /// Returns `true` when the fit had no revisions before.
    pub fn append(&mut self, revision: ReferenceRevision) -> Result<bool, HarnessError> {
        let revision = revision.rounded();
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|err| HarnessError::io(parent, err))?;
            }
            let mut line =
                serde_json::to_vec(&revision).map_err(|err| HarnessError::json(path, 0, err))?;
            line.push(b'\n');
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| HarnessError::io(path, err))?;
            file.write_all(&line)
                .map_err(|err| HarnessError::io(path, err))?;
        }
        Ok(self.fold(&revision))
    }

    /// Append a batch of imported rows, stamping method and import time.
    pub fn import(
        &mut self,
        rows: Vec<ReferenceRevision>,
        method: &str,
    ) -> Result<ImportSummary, HarnessError> {
        let imported_at = chrono::Utc::now().to_rfc3339();
        let mut summary = ImportSummary::default();
        for mut row in rows {
            if row.fit_id.trim().is_empty() {
                summary.rejected.push("<missing fitId>".to_string());
                continue;
            }
            row.reference_method.get_or_insert_with(|| method.to_string());
            row.imported_at.get_or_insert_with(|| imported_at.clone());
            if self.append(row)? {
                summary.new_fits += 1;
            } else {
                summary.updated_fits += 1;
            }
            summary.imported += 1;
        }
        Ok(summary)
    }

    pub fn contains(&self, fit_id: &str) -> bool {
        self.merged.contains_key(fit_id)
    }

    /// Current view for `fit_id`, checked against the pack's data version.
    pub fn lookup(&self, fit_id: &str, sde_version: &str, require_match: bool) -> ReferenceLookup {
        let Some(revision) = self.merged.get(fit_id) else {
            return ReferenceLookup::Missing;
        };
        let Some(result) = revision.to_result() else {
            return ReferenceLookup::Incomplete;
        };
        if require_match && result.sde_version != sde_version {
            return ReferenceLookup::Stale {
                found_version: result.sde_version,
            };
        }
        ReferenceLookup::Found(result)
    }

    pub fn fit_ids(&self) -> impl Iterator<Item = &str> {
        self.merged.keys().map(String::as_str)
    }

    pub fn revision_count(&self) -> usize {
        self.log_len
    }

    /// Current views sorted by fit ID, complete ones only.
    pub fn current_results(&self) -> Vec<MetricResult> {
        self.merged
            .values()
            .filter_map(ReferenceRevision::to_result)
            .collect()
    }
}
