//! Modifier buckets and stacking penalties.
//!
//! Contributions are folded into a [ModifierStack] per (item, attribute) and
//! composed against the base value in fixed bucket order:
//! pre-assign, pre multipliers then flat adds, post multipliers (with
//! penalty chains), post-assign.

use std::collections::BTreeMap;

use crate::data::pack::{EffectId, Operation};

/// Denominator of the stacking-penalty exponent: `c(i) = exp(-(i / 2.67)^2)`.
pub const PENALTY_SPREAD: f64 = 2.67;

/// Coefficient applied to the `index`-th strongest modifier in a penalty chain.
///
/// ```
/// # use dogma_parity::engine::stacking::penalty_coefficient;
/// assert_eq!(penalty_coefficient(0), 1.0);
/// assert!((penalty_coefficient(1) - 0.8691).abs() < 1e-4);
/// ```
pub fn penalty_coefficient(index: usize) -> f64 {
    let i = index as f64;
    (-(i / PENALTY_SPREAD).powi(2)).exp()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bucket {
    PreAssign,
    Pre,
    Post,
    PostAssign,
}

impl Operation {
    pub fn bucket(&self) -> Bucket {
        match self {
            Self::PreAssign => Bucket::PreAssign,
            Self::PreMul | Self::PrePercent | Self::ModAdd => Bucket::Pre,
            Self::PostPercent | Self::PostMul | Self::SkillScaled => Bucket::Post,
            Self::PostAssign => Bucket::PostAssign,
        }
    }

    /// Whether this operation may enter a stacking-penalty chain.
    pub fn is_penalizable(&self) -> bool {
        matches!(self, Self::PostPercent | Self::PostMul)
    }
}

/// Evaluation order of a contribution. Later keys win assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApplyOrder {
    pub effect_id: EffectId,
    pub source_index: usize,
    pub modifier_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StackCategory {
    PreAssign,
    PreMultiplier,
    Flat,
    PostMultiplier,
    PostAssign,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackContribution {
    pub order: ApplyOrder,
    pub category: StackCategory,
    /// Multiplier for multiplier categories, raw value otherwise.
    pub value: f64,
    /// Penalty group, only ever set on post multipliers.
    pub penalty_group: Option<String>,
}

impl StackContribution {
    /// Translate an operation and its resolved source value into a contribution.
    /// `skill_level` only matters for [Operation::SkillScaled].
    pub fn from_operation(
        order: ApplyOrder,
        operation: Operation,
        source_value: f64,
        skill_level: u8,
        penalty_group: Option<&str>,
    ) -> Self {
        let (category, value) = match operation {
            Operation::PreAssign => (StackCategory::PreAssign, source_value),
            Operation::PreMul => (StackCategory::PreMultiplier, source_value),
            Operation::PrePercent => (StackCategory::PreMultiplier, 1.0 + source_value / 100.0),
            Operation::ModAdd => (StackCategory::Flat, source_value),
            Operation::PostPercent => (StackCategory::PostMultiplier, 1.0 + source_value / 100.0),
            Operation::PostMul => (StackCategory::PostMultiplier, source_value),
            Operation::SkillScaled => (
                StackCategory::PostMultiplier,
                1.0 + source_value * f64::from(skill_level) / 100.0,
            ),
            Operation::PostAssign => (StackCategory::PostAssign, source_value),
        };
        let penalty_group = penalty_group
            .filter(|_| operation.is_penalizable())
            .map(str::to_string);
        Self {
            order,
            category,
            value,
            penalty_group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ChainKey {
    group: String,
    boost: bool,
}

/// Accumulated contributions for one attribute of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierStack {
    pre_assign: Option<(ApplyOrder, f64)>,
    pre_multiplier: f64,
    flat: f64,
    post_multiplier: f64,
    chains: BTreeMap<ChainKey, Vec<f64>>,
    post_assign: Option<(ApplyOrder, f64)>,
}

impl Default for ModifierStack {
    fn default() -> Self {
        Self {
            pre_assign: None,
            pre_multiplier: 1.0,
            flat: 0.0,
            post_multiplier: 1.0,
            chains: BTreeMap::new(),
            post_assign: None,
        }
    }
}

fn assign_latest(slot: &mut Option<(ApplyOrder, f64)>, order: ApplyOrder, value: f64) {
    match slot {
        Some((current, _)) if *current > order => {}
        _ => *slot = Some((order, value)),
    }
}

impl ModifierStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, contribution: StackContribution) {
        let StackContribution {
            order,
            category,
            value,
            penalty_group,
        } = contribution;
        match category {
            StackCategory::PreAssign => assign_latest(&mut self.pre_assign, order, value),
            StackCategory::PreMultiplier => self.pre_multiplier *= value,
            StackCategory::Flat => self.flat += value,
            StackCategory::PostMultiplier => match penalty_group {
                Some(group) => self
                    .chains
                    .entry(ChainKey {
                        group,
                        boost: value >= 1.0,
                    })
                    .or_default()
                    .push(value),
                None => self.post_multiplier *= value,
            },
            StackCategory::PostAssign => assign_latest(&mut self.post_assign, order, value),
        }
    }

    pub fn add_many<I>(&mut self, contributions: I)
    where
        I: IntoIterator<Item = StackContribution>,
    {
        for contribution in contributions {
            self.add(contribution);
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Product of every penalty chain's factor.
    pub fn penalized_factor(&self) -> f64 {
        self.chains
            .values()
            .map(|multipliers| penalized_chain_factor(multipliers))
            .product()
    }

    pub fn compose(&self, base: f64) -> f64 {
        if let Some((_, value)) = self.post_assign {
            return value;
        }
        let start = self.pre_assign.map_or(base, |(_, value)| value);
        let pre = start * self.pre_multiplier + self.flat;
        pre * self.post_multiplier * self.penalized_factor()
    }
}

/// Fold one penalty chain: strongest first, `1 + sum((m_i - 1) * c(i))`, floored at zero.
pub fn penalized_chain_factor(multipliers: &[f64]) -> f64 {
    let mut ordered: Vec<f64> = multipliers.to_vec();
    ordered.sort_by(|left, right| (right - 1.0).abs().total_cmp(&(left - 1.0).abs()));
    let sum: f64 = ordered
        .iter()
        .enumerate()
        .map(|(index, multiplier)| (multiplier - 1.0) * penalty_coefficient(index))
        .sum();
    (1.0 + sum).max(0.0)
}

/// Compose a base value with a set of contributions in one call.
pub fn compose_contributions<I>(base: f64, contributions: I) -> f64
where
    I: IntoIterator<Item = StackContribution>,
{
    let mut stack = ModifierStack::new();
    stack.add_many(contributions);
    stack.compose(base)
}
