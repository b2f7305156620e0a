//! EFT text adapter.
//!
//! Converts the de-facto EFT interchange text into a [Fit]. Lines that name
//! nothing in the pack are collected in [ParsedEft::unknown_lines] instead of
//! failing the parse; only a missing header or an unknown hull is fatal.

use serde::Serialize;
use tracing::debug;

use crate::data::ids;
use crate::data::pack::{DataPack, TypeDef};
use crate::error::FitError;
use crate::fit::model::{Fit, FittedModule, SlotKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedEft {
    pub fit: Fit,
    pub ship_name: String,
    pub fit_name: String,
    /// Lines kept out of the fit: unresolvable names and cargo-only items.
    pub unknown_lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Slot(SlotKind),
    Drones,
    Cargo,
}

struct ItemLine<'a> {
    name: &'a str,
    charge: Option<&'a str>,
    quantity: Option<u32>,
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn split_header(line: &str) -> Option<(String, String)> {
    let inner = line.strip_prefix('[')?;
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    let mut parts = inner.splitn(2, ',');
    let ship = parts.next()?.trim().to_string();
    if ship.is_empty() {
        return None;
    }
    let name = parts
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Fit")
        .to_string();
    Some((ship, name))
}

fn section_heading(line: &str) -> Option<Section> {
    let normalized = line.trim_end_matches(':').trim().to_ascii_lowercase();
    match normalized.as_str() {
        "high slots" | "high slot" => Some(Section::Slot(SlotKind::High)),
        "mid slots" | "mid slot" | "medium slots" => Some(Section::Slot(SlotKind::Mid)),
        "low slots" | "low slot" => Some(Section::Slot(SlotKind::Low)),
        "rig slots" | "rig slot" => Some(Section::Slot(SlotKind::Rig)),
        "subsystems" | "subsystem slots" | "subsystem slot" => {
            Some(Section::Slot(SlotKind::Subsystem))
        }
        "drones" | "drone bay" => Some(Section::Drones),
        "cargo" | "cargo hold" => Some(Section::Cargo),
        _ => None,
    }
}

fn is_empty_slot(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("[empty ") && lower.ends_with(" slot]")
}

fn parse_item_line(line: &str) -> Option<ItemLine<'_>> {
    let (body, quantity) = match line.rsplit_once(' ') {
        Some((head, tail))
            if tail.len() > 1
                && tail.starts_with(['x', 'X'])
                && tail[1..].chars().all(|ch| ch.is_ascii_digit()) =>
        {
            (head.trim(), tail[1..].parse::<u32>().ok().map(|q| q.max(1)))
        }
        _ => (line, None),
    };
    let mut parts = body.splitn(2, ',').map(str::trim);
    let name = parts.next().filter(|name| !name.is_empty())?;
    let charge = parts.next().filter(|charge| !charge.is_empty());
    Some(ItemLine {
        name,
        charge,
        quantity,
    })
}

fn guess_slot(type_def: &TypeDef, fallback: Section) -> Option<SlotKind> {
    if type_def.category_id == ids::category::SUBSYSTEM {
        return Some(SlotKind::Subsystem);
    }
    if type_def.has_effect(ids::effect::HI_POWER) {
        return Some(SlotKind::High);
    }
    if type_def.has_effect(ids::effect::MED_POWER) {
        return Some(SlotKind::Mid);
    }
    if type_def.has_effect(ids::effect::LO_POWER) {
        return Some(SlotKind::Low);
    }
    if type_def.has_effect(ids::effect::RIG_SLOT) {
        return Some(SlotKind::Rig);
    }
    match fallback {
        Section::Slot(slot) => Some(slot),
        Section::Drones | Section::Cargo => None,
    }
}

/// Parse EFT text into a validated fit.
pub fn parse_eft(pack: &DataPack, fit_id: &str, text: &str) -> Result<ParsedEft, FitError> {
    let mut lines = non_empty_lines(text);
    let header = lines
        .next()
        .ok_or_else(|| FitError::InvalidHeader("empty text".to_string()))?;
    let (ship_name, fit_name) =
        split_header(header).ok_or_else(|| FitError::InvalidHeader(header.to_string()))?;
    let hull = pack
        .type_by_name(&ship_name)
        .filter(|hull| hull.category_id == ids::category::SHIP)
        .ok_or_else(|| FitError::UnknownShipName(ship_name.clone()))?;

    let mut builder = Fit::builder(fit_id, hull.type_id);
    let mut unknown_lines = Vec::new();
    let mut section = Section::Slot(SlotKind::Low);

    for line in lines {
        if let Some(heading) = section_heading(line) {
            section = heading;
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            continue;
        }
        let Some(item) = parse_item_line(line) else {
            unknown_lines.push(line.to_string());
            continue;
        };
        let Some(type_def) = pack.type_by_name(item.name) else {
            unknown_lines.push(line.to_string());
            continue;
        };

        match type_def.category_id {
            ids::category::DRONE => {
                builder = builder.drone(type_def.type_id, item.quantity.unwrap_or(1));
                section = Section::Drones;
            }
            ids::category::MODULE | ids::category::SUBSYSTEM if section != Section::Cargo => {
                let Some(slot) = guess_slot(type_def, section) else {
                    unknown_lines.push(line.to_string());
                    continue;
                };
                let mut module = FittedModule::new(type_def.type_id, slot);
                if let Some(charge) = item
                    .charge
                    .and_then(|name| pack.type_by_name(name))
                    .filter(|charge| charge.category_id == ids::category::CHARGE)
                {
                    module = module.with_charge(charge.type_id);
                }
                builder = builder.module(module);
            }
            _ => unknown_lines.push(line.to_string()),
        }
    }

    if !unknown_lines.is_empty() {
        debug!(fit_id, unknown = unknown_lines.len(), "eft lines left unresolved");
    }

    Ok(ParsedEft {
        fit: builder.build(pack)?,
        ship_name,
        fit_name,
        unknown_lines,
    })
}

/// Canonical EFT text: header, then item lines with collapsed whitespace and
/// `", "` separators, sorted. Section headings and empty-slot markers drop out.
pub fn normalize_eft(text: &str) -> Result<String, FitError> {
    let mut lines = non_empty_lines(text);
    let header = lines
        .next()
        .ok_or_else(|| FitError::InvalidHeader("empty text".to_string()))?;
    let (ship, fit_name) =
        split_header(header).ok_or_else(|| FitError::InvalidHeader(header.to_string()))?;

    let mut items: Vec<String> = lines
        .filter(|line| section_heading(line).is_none() && !is_empty_slot(line))
        .map(canonicalize_line)
        .collect();
    items.sort();

    let mut normalized = format!("[{ship}, {fit_name}]");
    for item in items {
        normalized.push('\n');
        normalized.push_str(&item);
    }
    Ok(normalized)
}

fn canonicalize_line(line: &str) -> String {
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(", ")
}
