//! Harness configuration: `dogma-parity.yaml` plus environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::manifest::DEFAULT_MANIFEST_PATH;
use crate::error::ConfigError;
use crate::parity::compare::ThresholdPolicy;
use crate::parity::corpus::{DEFAULT_CORPUS_PATH, DEFAULT_GOLDEN_IDS_PATH};
use crate::parity::gate::GateConfig;
use crate::parity::reference::DEFAULT_REFERENCE_PATH;
use crate::parity::summary::SummaryLimits;
use crate::parity::tool::FetchOptions;

pub const DEFAULT_CONFIG_PATH: &str = "dogma-parity.yaml";
pub const CONFIG_PATH_ENV: &str = "DOGMA_PARITY_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceToolConfig {
    /// Program to run per fit. None disables fetching.
    pub program: Option<String>,
    pub args: Vec<String>,
    pub timeout_ms: u64,
    pub concurrency: usize,
}

impl Default for ReferenceToolConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout_ms: 60_000,
            concurrency: 4,
        }
    }
}

impl ReferenceToolConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            concurrency: self.concurrency.max(1),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarnessConfig {
    pub manifest_path: PathBuf,
    pub corpus_path: PathBuf,
    pub reference_path: PathBuf,
    pub golden_ids_path: PathBuf,
    pub reports_dir: PathBuf,
    pub threshold: ThresholdPolicy,
    pub gate: GateConfig,
    pub reference_tool: ReferenceToolConfig,
    /// Compare-stage threads; 0 uses every core.
    pub workers: usize,
    pub top_mismatch_limit: usize,
    pub failing_metrics_per_fit: usize,
    pub require_matching_data_version: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let limits = SummaryLimits::default();
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            reference_path: PathBuf::from(DEFAULT_REFERENCE_PATH),
            golden_ids_path: PathBuf::from(DEFAULT_GOLDEN_IDS_PATH),
            reports_dir: PathBuf::from("reports"),
            threshold: ThresholdPolicy::default(),
            gate: GateConfig::default(),
            reference_tool: ReferenceToolConfig::default(),
            workers: 0,
            top_mismatch_limit: limits.top_mismatches,
            failing_metrics_per_fit: limits.failing_metrics_per_fit,
            require_matching_data_version: true,
        }
    }
}

fn parse_override<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        name,
        value: raw.to_string(),
    })
}

impl HarnessConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `DOGMA_PARITY_CONFIG` (or `dogma-parity.yaml`) and apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("DOGMA_PARITY_REL_MAX") {
            let rel_max: f64 = parse_override("DOGMA_PARITY_REL_MAX", &raw)?;
            if !rel_max.is_finite() || rel_max <= 0.0 {
                return Err(ConfigError::InvalidOverride {
                    name: "DOGMA_PARITY_REL_MAX",
                    value: raw,
                });
            }
            self.threshold.rel_max = rel_max;
        }
        if let Some(raw) = lookup("DOGMA_PARITY_WORKERS") {
            self.workers = parse_override("DOGMA_PARITY_WORKERS", &raw)?;
        }
        if let Some(raw) = lookup("DOGMA_PARITY_REFERENCE_TIMEOUT_MS") {
            self.reference_tool.timeout_ms =
                parse_override("DOGMA_PARITY_REFERENCE_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("DOGMA_PARITY_REFERENCE_CONCURRENCY") {
            self.reference_tool.concurrency =
                parse_override("DOGMA_PARITY_REFERENCE_CONCURRENCY", &raw)?;
        }
        if let Some(raw) = lookup("DOGMA_PARITY_REFERENCE_CMD") {
            let mut parts = raw.split_whitespace().map(str::to_string);
            let Some(program) = parts.next() else {
                return Err(ConfigError::InvalidOverride {
                    name: "DOGMA_PARITY_REFERENCE_CMD",
                    value: raw,
                });
            };
            self.reference_tool.program = Some(program);
            self.reference_tool.args = parts.collect();
        }
        Ok(())
    }

    pub fn summary_limits(&self) -> SummaryLimits {
        SummaryLimits {
            top_mismatches: self.top_mismatch_limit,
            failing_metrics_per_fit: self.failing_metrics_per_fit,
        }
    }
}
