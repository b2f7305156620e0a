//! Error types for pack loading, fit construction and the parity harness.
//!
//! Unknown static references inside a well-formed fit are not errors: the
//! resolver records them as coverage gaps and keeps going. Everything here is
//! a hard failure at an API boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading or indexing the static data pack.
#[derive(Debug, Error)]
pub enum PackError {
    /// Pack or manifest file could not be read.
    #[error("unable to read '{path}': {source}")]
    Io {
        /// File that failed to read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pack or manifest JSON did not parse.
    #[error("unable to parse json '{path}': {source}")]
    Json {
        /// File that failed to parse.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The pack file does not hash to the checksum recorded in the manifest.
    #[error("checksum mismatch for '{path}': manifest {expected}, file {actual}")]
    ChecksumMismatch {
        /// Pack file.
        path: PathBuf,
        /// Checksum recorded in the manifest.
        expected: String,
        /// Checksum of the bytes on disk.
        actual: String,
    },

    /// Two records of the same table share an ID.
    #[error("duplicate {table} id {id}")]
    DuplicateId {
        /// Table name (`types`, `attributes`, `effects`).
        table: &'static str,
        /// Duplicated identifier.
        id: u32,
    },
}

/// Malformed fit input. These reject the fit before resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FitError {
    /// The fit has no hull.
    #[error("fit '{0}' is empty")]
    EmptyFit(String),

    /// The hull type is not in the pack or is not a ship.
    #[error("unknown hull type {0}")]
    UnknownHull(u32),

    /// A fitted item type is not in the pack.
    #[error("unknown item type {type_id} in {slot}")]
    UnknownType {
        /// Offending type.
        type_id: u32,
        /// Where in the fit it appeared.
        slot: String,
    },

    /// A fitted item is of a category that cannot occupy its slot.
    #[error("type {type_id} (category {category_id}) cannot be fitted as {slot}")]
    WrongCategory {
        /// Offending type.
        type_id: u32,
        /// Category found in the pack.
        category_id: u32,
        /// Slot it was fitted into.
        slot: String,
    },

    /// EFT text has no `[Hull, Name]` header.
    #[error("invalid EFT header: {0}")]
    InvalidHeader(String),

    /// EFT header names a hull the pack does not know.
    #[error("unknown ship '{0}'")]
    UnknownShipName(String),
}

/// Harness configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read.
    #[error("unable to read config '{path}': {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config YAML did not parse.
    #[error("unable to parse config '{path}': {source}")]
    Yaml {
        /// Config path.
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value '{value}' for {name}")]
    InvalidOverride {
        /// Environment variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Failure of a single reference-tool invocation. Never aborts a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReferenceToolError {
    /// No reference program configured.
    #[error("reference tool is not configured")]
    NotConfigured,

    /// The child process could not be started.
    #[error("failed to spawn reference tool: {0}")]
    Spawn(String),

    /// The call exceeded its time budget.
    #[error("reference tool timed out after {0} ms")]
    Timeout(u64),

    /// The child exited unsuccessfully.
    #[error("reference tool exited with status {status}: {stderr_tail}")]
    Exit {
        /// Exit code, if any.
        status: i32,
        /// Last lines of stderr.
        stderr_tail: String,
    },

    /// The child printed something that is not a metric result.
    #[error("unparsable reference output: {0}")]
    Parse(String),
}

impl ReferenceToolError {
    /// Short stage label used in sync reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NotConfigured => "config",
            Self::Spawn(_) => "spawn",
            Self::Timeout(_) => "timeout",
            Self::Exit { .. } => "exit",
            Self::Parse(_) => "parse",
        }
    }
}

/// Harness-level failures (store IO, illegal run transitions).
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Store, corpus or report IO failed.
    #[error("io error on '{path}': {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store, corpus or report JSON failed.
    #[error("json error on '{path}' line {line}: {source}")]
    Json {
        /// File involved.
        path: PathBuf,
        /// 1-based line for JSONL files, 0 for whole-file documents.
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// CSV export failed.
    #[error("csv error on '{path}': {source}")]
    Csv {
        /// File involved.
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A run was driven out of order.
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// Pack could not be loaded.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Config could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The reference tool's worker pool could not be built.
    #[error("unable to build worker pool: {0}")]
    WorkerPool(String),
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, line: usize, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            line,
            source,
        }
    }
}
