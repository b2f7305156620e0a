use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::data::pack::{DataPack, Domain, PackFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn count(&self, severity: ValidationSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == severity)
            .count()
    }
}

/// Check a raw pack file for problems the indexer would hide or reject.
/// Runs before [DataPack::from_file] so duplicates are reported rather than fatal.
pub fn validate_pack_file(file: &PackFile) -> ValidationReport {
    let mut report = ValidationReport::default();

    if file.sde_version.trim().is_empty() {
        report.push(ValidationSeverity::Error, "pack", "missing 'sdeVersion'");
    }

    let mut attribute_ids = HashSet::new();
    for (index, attribute) in file.attributes.iter().enumerate() {
        let context = format!("attributes[{index}] id={}", attribute.attribute_id);
        if !attribute_ids.insert(attribute.attribute_id) {
            report.push(ValidationSeverity::Error, context.clone(), "duplicate attribute id");
        }
        if !attribute.default_value.is_finite() {
            report.push(
                ValidationSeverity::Error,
                context.clone(),
                "default value is not finite",
            );
        }
        if attribute.name.trim().is_empty() {
            report.push(ValidationSeverity::Warning, context, "missing attribute name");
        }
    }

    let mut effect_ids = HashSet::new();
    for (index, effect) in file.effects.iter().enumerate() {
        let context = format!("effects[{index}] id={} '{}'", effect.effect_id, effect.name);
        if !effect_ids.insert(effect.effect_id) {
            report.push(ValidationSeverity::Error, context.clone(), "duplicate effect id");
        }
        if effect.modifiers.is_empty() {
            report.push(
                ValidationSeverity::Info,
                context.clone(),
                "effect has no modifiers and will not be modeled",
            );
        }
        for (modifier_index, modifier) in effect.modifiers.iter().enumerate() {
            let modifier_context = format!("{context}.modifiers[{modifier_index}]");
            for (label, attribute_id) in [
                ("target", modifier.target_attribute_id),
                ("source", modifier.source_attribute_id),
            ] {
                if !attribute_ids.contains(&attribute_id) {
                    report.push(
                        ValidationSeverity::Warning,
                        modifier_context.clone(),
                        format!("{label} attribute {attribute_id} is not defined"),
                    );
                }
            }
            if modifier.domain == Domain::Group
                && modifier.filter.as_ref().map_or(true, |f| f.is_empty())
            {
                report.push(
                    ValidationSeverity::Error,
                    modifier_context.clone(),
                    "group-domain modifier has no filter",
                );
            }
            if modifier.domain == Domain::Target {
                report.push(
                    ValidationSeverity::Info,
                    modifier_context,
                    "target-domain modifier is outside fit resolution",
                );
            }
        }
    }

    let mut type_ids = HashSet::new();
    for (index, type_def) in file.types.iter().enumerate() {
        let context = format!("types[{index}] id={}", type_def.type_id);
        if !type_ids.insert(type_def.type_id) {
            report.push(ValidationSeverity::Error, context.clone(), "duplicate type id");
        }
        if type_def.name.trim().is_empty() {
            report.push(ValidationSeverity::Error, context.clone(), "missing non-empty 'name'");
        }
        for (attribute_id, value) in &type_def.attributes {
            if !value.is_finite() {
                report.push(
                    ValidationSeverity::Error,
                    context.clone(),
                    format!("attribute {attribute_id} value is not finite"),
                );
            }
        }
        for effect_id in &type_def.effects {
            if !effect_ids.contains(effect_id) {
                report.push(
                    ValidationSeverity::Warning,
                    context.clone(),
                    format!("effect {effect_id} is not defined"),
                );
            }
        }
    }

    report
}

/// Summary line for an indexed pack, used by the `validate` command.
pub fn describe_pack(pack: &DataPack) -> String {
    format!(
        "sde_version={} types={} skills={}",
        pack.sde_version(),
        pack.type_count(),
        pack.skill_type_ids().len()
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::pack::{
        AttributeDef, EffectCategory, EffectDef, Modifier, Operation, TypeDef,
    };

    fn attribute(attribute_id: u32) -> AttributeDef {
        AttributeDef {
            attribute_id,
            name: format!("attr{attribute_id}"),
            default_value: 0.0,
            high_is_good: true,
            stacking_group: None,
        }
    }

    #[test]
    fn clean_pack_has_no_errors() {
        let mut file = PackFile::new("sde-1");
        file.attributes.push(attribute(9));
        file.types.push(TypeDef {
            type_id: 587,
            name: "Rifter".to_string(),
            group_id: 25,
            category_id: 6,
            attributes: BTreeMap::from([(9, 350.0)]),
            effects: Vec::new(),
        });

        let report = validate_pack_file(&file);
        assert!(!report.has_errors(), "{:?}", report.diagnostics);
    }

    #[test]
    fn reports_duplicates_and_unfiltered_group_modifiers() {
        let mut file = PackFile::new("sde-1");
        file.attributes.push(attribute(9));
        file.attributes.push(attribute(9));
        file.effects.push(EffectDef {
            effect_id: 1,
            name: "broken".to_string(),
            category: EffectCategory::Passive,
            modifiers: vec![Modifier {
                domain: Domain::Group,
                filter: None,
                target_attribute_id: 9,
                source_attribute_id: 404,
                operation: Operation::PostPercent,
                skill_type_id: None,
            }],
        });

        let report = validate_pack_file(&file);
        assert!(report.has_errors());
        assert_eq!(report.count(ValidationSeverity::Error), 2);
        assert!(report
            .diagnostics
            .iter()
            .any(|diag| diag.message.contains("source attribute 404")));
    }

    #[test]
    fn unknown_effect_reference_is_warning_only() {
        let mut file = PackFile::new("sde-1");
        file.types.push(TypeDef {
            type_id: 1,
            name: "Widget".to_string(),
            group_id: 0,
            category_id: 7,
            attributes: BTreeMap::new(),
            effects: vec![999],
        });

        let report = validate_pack_file(&file);
        assert!(!report.has_errors());
        assert_eq!(report.count(ValidationSeverity::Warning), 1);
    }
}
