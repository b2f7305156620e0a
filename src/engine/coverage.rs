//! Coverage gaps: static references the resolver skipped instead of failing on.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::pack::{AttributeId, EffectId, TypeId};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CoverageGap {
    /// A type lists an effect the pack does not define.
    #[serde(rename_all = "camelCase")]
    UnknownEffect {
        effect_id: EffectId,
        source_type_id: TypeId,
    },
    /// A modifier reads or writes an attribute the pack does not define.
    #[serde(rename_all = "camelCase")]
    UnknownAttribute {
        attribute_id: AttributeId,
        effect_id: EffectId,
    },
    /// An attribute's value depends on itself; the base value was used.
    #[serde(rename_all = "camelCase")]
    DependencyCycle {
        type_id: TypeId,
        attribute_id: AttributeId,
    },
}

impl CoverageGap {
    pub fn effect_id(&self) -> Option<EffectId> {
        match self {
            Self::UnknownEffect { effect_id, .. } | Self::UnknownAttribute { effect_id, .. } => {
                Some(*effect_id)
            }
            Self::DependencyCycle { .. } => None,
        }
    }
}

/// Deduplicated, ordered gaps recorded during one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageLedger {
    gaps: BTreeSet<CoverageGap>,
}

impl CoverageLedger {
    pub fn record(&mut self, gap: CoverageGap) {
        if self.gaps.insert(gap.clone()) {
            debug!(?gap, "coverage gap");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn into_vec(self) -> Vec<CoverageGap> {
        self.gaps.into_iter().collect()
    }
}

/// Gap counts across many fits: how many fits hit each gap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GapTally {
    counts: BTreeMap<CoverageGap, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapCount {
    pub gap: CoverageGap,
    pub fits: usize,
}

impl GapTally {
    pub fn add_fit<'a, I>(&mut self, gaps: I)
    where
        I: IntoIterator<Item = &'a CoverageGap>,
    {
        for gap in gaps {
            *self.counts.entry(gap.clone()).or_default() += 1;
        }
    }

    /// Most frequent first, ties in gap order.
    pub fn ranked(&self) -> Vec<GapCount> {
        let mut ranked: Vec<GapCount> = self
            .counts
            .iter()
            .map(|(gap, fits)| GapCount {
                gap: gap.clone(),
                fits: *fits,
            })
            .collect();
        ranked.sort_by(|left, right| {
            right
                .fits
                .cmp(&left.fits)
                .then_with(|| left.gap.cmp(&right.gap))
        });
        ranked
    }

    /// Fit counts per effect ID, for merging into the coverage audit.
    pub fn by_effect(&self) -> BTreeMap<EffectId, usize> {
        let mut by_effect = BTreeMap::new();
        for (gap, fits) in &self.counts {
            if let Some(effect_id) = gap.effect_id() {
                *by_effect.entry(effect_id).or_default() += fits;
            }
        }
        by_effect
    }
}
