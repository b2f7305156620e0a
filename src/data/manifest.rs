//! Pack manifest: which pack version is active, where it lives, and its checksum.
//! Written by the extraction step; read once at startup to load the shared pack.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::data::pack::{DataPack, PackFile};
use crate::error::PackError;

pub const DEFAULT_MANIFEST_PATH: &str = "data/dogma/manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackManifest {
    pub active_version: String,
    /// Pack path, relative to the manifest's directory unless absolute.
    pub pack_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl PackManifest {
    pub fn pack_path(&self, manifest_path: &Path) -> PathBuf {
        let pack = Path::new(&self.pack_file);
        if pack.is_absolute() {
            return pack.to_path_buf();
        }
        manifest_path
            .parent()
            .map(|dir| dir.join(pack))
            .unwrap_or_else(|| pack.to_path_buf())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, PackError> {
    fs::read(path).map_err(|source| PackError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_manifest(path: &Path) -> Result<PackManifest, PackError> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| PackError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and index a pack file directly, without checksum verification.
pub fn load_pack_file(path: &Path) -> Result<DataPack, PackError> {
    let bytes = read_bytes(path)?;
    parse_pack(path, &bytes)
}

/// Read a pack file without indexing it, for validation of raw tables.
pub fn read_pack_file(path: &Path) -> Result<PackFile, PackError> {
    let bytes = read_bytes(path)?;
    decode_pack(path, &bytes)
}

fn decode_pack(path: &Path, bytes: &[u8]) -> Result<PackFile, PackError> {
    serde_json::from_slice(bytes).map_err(|source| PackError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_pack(path: &Path, bytes: &[u8]) -> Result<DataPack, PackError> {
    DataPack::from_file(decode_pack(path, bytes)?)
}

/// Load the pack named by a manifest. Returns an Arc so it can be shared across workers.
/// When the manifest carries a checksum, the pack bytes must match it.
pub fn load_pack(manifest_path: &Path) -> Result<Arc<DataPack>, PackError> {
    let manifest = load_manifest(manifest_path)?;
    let pack_path = manifest.pack_path(manifest_path);
    let bytes = read_bytes(&pack_path)?;

    if let Some(expected) = manifest.sha256.as_deref().filter(|s| !s.is_empty()) {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(PackError::ChecksumMismatch {
                path: pack_path,
                expected: expected.to_string(),
                actual,
            });
        }
        debug!(path = %pack_path.display(), "pack checksum verified");
    }

    let pack = parse_pack(&pack_path, &bytes)?;
    info!(
        version = %manifest.active_version,
        sde_version = pack.sde_version(),
        types = pack.type_count(),
        "loaded data pack"
    );
    Ok(Arc::new(pack))
}
