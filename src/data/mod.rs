pub mod ids;
pub mod manifest;
pub mod pack;
pub mod validate;

pub use manifest::{
    load_manifest, load_pack, load_pack_file, read_pack_file, sha256_hex, PackManifest,
    DEFAULT_MANIFEST_PATH,
};
pub use pack::{
    normalize_lookup, AttributeDef, AttributeId, CategoryId, DataPack, Domain, EffectCategory,
    EffectDef, EffectId, GroupId, ItemFilter, Modifier, NamedId, Operation, PackFile, TypeDef,
    TypeId,
};
pub use validate::{describe_pack, validate_pack_file, ValidationDiagnostic, ValidationReport, ValidationSeverity};
