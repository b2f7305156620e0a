//! Fit corpus: the EFT fits the harness compares, deduplicated by content.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::data::pack::TypeId;
use crate::error::HarnessError;

pub const DEFAULT_CORPUS_PATH: &str = "data/parity/fit-corpus.jsonl";
pub const DEFAULT_GOLDEN_IDS_PATH: &str = "data/parity/golden-fit-ids.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusOrigin {
    Zkill,
    Manual,
    Svcfitstat,
}

impl CorpusOrigin {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "zkill" => Some(Self::Zkill),
            "manual" => Some(Self::Manual),
            "svcfitstat" => Some(Self::Svcfitstat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusEntry {
    pub fit_id: String,
    pub ship_type_id: TypeId,
    pub eft: String,
    pub origin: CorpusOrigin,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Content key of an EFT text: SHA-256 over its trimmed, whitespace-collapsed,
/// non-empty lines sorted lexically. Line order and spacing do not matter.
pub fn fingerprint(eft: &str) -> String {
    let mut lines: Vec<String> = eft
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();
    lines.sort();
    hex::encode(Sha256::digest(lines.join("\n").as_bytes()))
}

const TAG_KEYWORDS: [(&str, &[&str]); 7] = [
    ("hybrid-turret", &["blaster", "rail", "hybrid"]),
    ("projectile-turret", &["autocannon", "artillery", "projectile"]),
    ("laser-turret", &["laser", "beam", "pulse"]),
    ("missile", &["launcher", "missile", "rocket", "torpedo"]),
    ("drone-primary", &["drone"]),
    ("shield-tank", &["shield", "invulnerability", "extender"]),
    ("armor-tank", &["armor", "plate", "membrane"]),
];

/// Weapon and tank tags guessed from item names.
pub fn infer_tags(eft: &str) -> Vec<String> {
    let lower = eft.to_lowercase();
    TAG_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(*keyword)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    /// Same content already present under another fit ID.
    DuplicateFingerprint { existing_fit_id: String },
    DuplicateFitId,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: BTreeMap<String, CorpusEntry>,
    by_fingerprint: HashMap<String, String>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the fit ID or the content fingerprint is already present.
    pub fn insert(&mut self, entry: CorpusEntry) -> InsertOutcome {
        if self.entries.contains_key(&entry.fit_id) {
            return InsertOutcome::DuplicateFitId;
        }
        let key = fingerprint(&entry.eft);
        if let Some(existing) = self.by_fingerprint.get(&key) {
            return InsertOutcome::DuplicateFingerprint {
                existing_fit_id: existing.clone(),
            };
        }
        self.by_fingerprint.insert(key, entry.fit_id.clone());
        self.entries.insert(entry.fit_id.clone(), entry);
        InsertOutcome::Added
    }

    pub fn get(&self, fit_id: &str) -> Option<&CorpusEntry> {
        self.entries.get(fit_id)
    }

    /// Entries in fit-ID order.
    pub fn entries(&self) -> impl Iterator<Item = &CorpusEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a JSONL corpus. A missing file is an empty corpus.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let mut corpus = Self::new();
        if !path.exists() {
            debug!(path = %path.display(), "no corpus file, starting empty");
            return Ok(corpus);
        }
        let raw = fs::read_to_string(path).map_err(|err| HarnessError::io(path, err))?;
        let mut duplicates = 0usize;
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: CorpusEntry = serde_json::from_str(line)
                .map_err(|err| HarnessError::json(path, index + 1, err))?;
            if corpus.insert(entry) != InsertOutcome::Added {
                duplicates += 1;
            }
        }
        info!(path = %path.display(), entries = corpus.len(), duplicates, "loaded fit corpus");
        Ok(corpus)
    }

    pub fn save(&self, path: &Path) -> Result<(), HarnessError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| HarnessError::io(parent, err))?;
        }
        let mut out = Vec::new();
        for entry in self.entries() {
            serde_json::to_writer(&mut out, entry).map_err(|err| HarnessError::json(path, 0, err))?;
            out.write_all(b"\n").map_err(|err| HarnessError::io(path, err))?;
        }
        fs::write(path, out).map_err(|err| HarnessError::io(path, err))
    }
}

/// Golden fit IDs: a JSON array of strings. A missing file means no golden set.
pub fn load_golden_ids(path: &Path) -> Result<Option<BTreeSet<String>>, HarnessError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|err| HarnessError::io(path, err))?;
    let ids: Vec<String> = serde_json::from_str(&raw).map_err(|err| HarnessError::json(path, 0, err))?;
    Ok(Some(ids.into_iter().collect()))
}
