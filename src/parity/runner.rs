//! Parity run: `pending -> fetching-reference -> comparing -> reported`.
//!
//! Reference fetching from the external tool is async and happens before the
//! run collects references (see [crate::parity::tool::fetch_references]). The
//! compare stage is synchronous and fans out over a Rayon pool, batch by batch,
//! checking the run's [CancellationFlag] between fits.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::pack::DataPack;
use crate::engine::calculate;
use crate::engine::coverage::{CoverageGap, GapTally};
use crate::engine::metrics::MetricResult;
use crate::error::HarnessError;
use crate::fit::eft::{normalize_eft, parse_eft};
use crate::parallel::{batch_count, batch_ranges, CancellationFlag, Progress, WorkerPool};
use crate::parity::backlog::build_backlog;
use crate::parity::compare::{compare_results, ComparisonRow, ThresholdPolicy};
use crate::parity::corpus::{Corpus, CorpusEntry};
use crate::parity::gate::{evaluate_gate, GateConfig};
use crate::parity::reference::{ReferenceLookup, ReferenceStore};
use crate::parity::report::ParityReport;
use crate::parity::summary::{
    build_summary, MissingReason, MissingReference, SummaryInput, SummaryLimits,
};
use crate::parity::tool::{ReferenceRequest, SyncReport};

const COMPARE_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Pending,
    FetchingReference,
    Comparing,
    Reported,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingReference => "fetching-reference",
            Self::Comparing => "comparing",
            Self::Reported => "reported",
        }
    }

    fn next(&self) -> Option<RunState> {
        match self {
            Self::Pending => Some(Self::FetchingReference),
            Self::FetchingReference => Some(Self::Comparing),
            Self::Comparing => Some(Self::Reported),
            Self::Reported => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub policy: ThresholdPolicy,
    pub gate: GateConfig,
    pub limits: SummaryLimits,
    pub pool: WorkerPool,
    pub require_matching_data_version: bool,
    pub golden_ids: Option<BTreeSet<String>>,
}

/// Requests for every corpus fit, with the EFT normalized when it parses.
pub fn reference_requests(corpus: &Corpus, sde_version: &str) -> Vec<ReferenceRequest> {
    corpus
        .entries()
        .map(|entry| ReferenceRequest {
            fit_id: entry.fit_id.clone(),
            ship_type_id: entry.ship_type_id,
            eft: normalize_eft(&entry.eft).unwrap_or_else(|_| entry.eft.clone()),
            sde_version: sde_version.to_string(),
        })
        .collect()
}

enum FitOutcome {
    Compared(ComparisonRow, Vec<CoverageGap>),
    Rejected(MissingReference),
    Cancelled,
}

pub struct ParityRun<'a> {
    pack: &'a DataPack,
    corpus: &'a Corpus,
    options: RunOptions,
    cancel: CancellationFlag,
    state: RunState,
    references: BTreeMap<String, MetricResult>,
    missing: Vec<MissingReference>,
    rows: Vec<ComparisonRow>,
    gaps: GapTally,
    sync: Option<SyncReport>,
    cancelled_fits: usize,
}

impl<'a> ParityRun<'a> {
    pub fn new(
        pack: &'a DataPack,
        corpus: &'a Corpus,
        options: RunOptions,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            pack,
            corpus,
            options,
            cancel,
            state: RunState::Pending,
            references: BTreeMap::new(),
            missing: Vec::new(),
            rows: Vec::new(),
            gaps: GapTally::default(),
            sync: None,
            cancelled_fits: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn advance(&mut self, to: RunState) -> Result<(), HarnessError> {
        if self.state.next() != Some(to) {
            return Err(HarnessError::InvalidTransition {
                from: self.state.as_str(),
                to: to.as_str(),
            });
        }
        debug!(from = self.state.as_str(), to = to.as_str(), "parity run transition");
        self.state = to;
        Ok(())
    }

    /// Pick up the current reference for every corpus fit. `sync` is the
    /// report of a fetch that ran just before; its failures are reported as
    /// tool failures rather than plain missing references.
    pub fn collect_references(
        &mut self,
        store: &ReferenceStore,
        sync: Option<SyncReport>,
    ) -> Result<(), HarnessError> {
        self.advance(RunState::FetchingReference)?;
        let failed: BTreeMap<&str, &str> = sync
            .iter()
            .flat_map(|report| report.failed.iter())
            .map(|failure| (failure.fit_id.as_str(), failure.reason.as_str()))
            .collect();

        let sde_version = self.pack.sde_version();
        let mut missing = Vec::new();
        for entry in self.corpus.entries() {
            let lookup = store.lookup(
                &entry.fit_id,
                sde_version,
                self.options.require_matching_data_version,
            );
            let (reason, detail) = match lookup {
                ReferenceLookup::Found(result) => {
                    self.references.insert(entry.fit_id.clone(), result);
                    continue;
                }
                ReferenceLookup::Stale { found_version } => {
                    warn!(
                        fit_id = %entry.fit_id,
                        found_version = %found_version,
                        expected = sde_version,
                        "stale reference"
                    );
                    (MissingReason::Stale, Some(format!("reference built against {found_version}")))
                }
                ReferenceLookup::Missing | ReferenceLookup::Incomplete => {
                    match failed.get(entry.fit_id.as_str()) {
                        Some(reason) => (MissingReason::ToolFailed, Some(reason.to_string())),
                        None => (MissingReason::Missing, None),
                    }
                }
            };
            missing.push(MissingReference {
                fit_id: entry.fit_id.clone(),
                ship_type_id: entry.ship_type_id,
                reason,
                detail,
                golden: false,
            });
        }
        info!(
            references = self.references.len(),
            missing = missing.len(),
            "collected references"
        );
        self.missing.extend(missing);
        self.sync = sync;
        Ok(())
    }

    fn compare_entry(&self, entry: &CorpusEntry, expected: &MetricResult) -> FitOutcome {
        if self.cancel.is_cancelled() {
            return FitOutcome::Cancelled;
        }
        let rejected = |detail: String| {
            FitOutcome::Rejected(MissingReference {
                fit_id: entry.fit_id.clone(),
                ship_type_id: entry.ship_type_id,
                reason: MissingReason::RejectedFit,
                detail: Some(detail),
                golden: false,
            })
        };
        let parsed = match parse_eft(self.pack, &entry.fit_id, &entry.eft) {
            Ok(parsed) => parsed,
            Err(err) => return rejected(err.to_string()),
        };
        match calculate(self.pack, &parsed.fit) {
            Ok(metrics) => FitOutcome::Compared(
                compare_results(expected, &metrics.result, &self.options.policy),
                metrics.coverage_gaps,
            ),
            Err(err) => rejected(err.to_string()),
        }
    }

    /// Run the engine on every fit with a reference and compare.
    pub fn compare(&mut self) -> Result<(), HarnessError> {
        self.advance(RunState::Comparing)?;
        let references = std::mem::take(&mut self.references);
        let corpus = self.corpus;
        let work: Vec<(&CorpusEntry, &MetricResult)> = corpus
            .entries()
            .filter_map(|entry| {
                references
                    .get(&entry.fit_id)
                    .map(|expected| (entry, expected))
            })
            .collect();
        let progress = Progress::new("compare", work.len());
        let ranges = batch_ranges(work.len(), batch_count(work.len(), COMPARE_BATCH_SIZE));

        let mut outcomes = Vec::with_capacity(work.len());
        let mut cancelled = 0usize;
        {
            let this = &*self;
            for (start, end) in ranges {
                if this.cancel.is_cancelled() {
                    warn!(remaining = work.len() - start, "compare cancelled");
                    cancelled += work.len() - start;
                    break;
                }
                let batch = &work[start..end];
                let results: Vec<FitOutcome> = this.options.pool.install(|| {
                    batch
                        .par_iter()
                        .map(|(entry, expected)| this.compare_entry(entry, expected))
                        .collect()
                })?;
                progress.advance(batch.len());
                outcomes.extend(results);
            }
        }
        self.cancelled_fits += cancelled;

        for outcome in outcomes {
            match outcome {
                FitOutcome::Compared(row, gaps) => {
                    self.gaps.add_fit(&gaps);
                    self.rows.push(row);
                }
                FitOutcome::Rejected(missing) => {
                    warn!(fit_id = %missing.fit_id, detail = ?missing.detail, "fit rejected");
                    self.missing.push(missing);
                }
                FitOutcome::Cancelled => self.cancelled_fits += 1,
            }
        }
        self.rows.sort_by(|left, right| left.fit_id.cmp(&right.fit_id));
        info!(
            compared = self.rows.len(),
            failing = self.rows.iter().filter(|row| !row.pass).count(),
            cancelled = self.cancelled_fits,
            "compare finished"
        );
        Ok(())
    }

    /// Close the run and assemble summary, gate and backlog.
    pub fn report(mut self, generated_at: String) -> Result<ParityReport, HarnessError> {
        self.advance(RunState::Reported)?;
        let summary = build_summary(
            SummaryInput {
                rows: &self.rows,
                missing: std::mem::take(&mut self.missing),
                golden_ids: self.options.golden_ids.as_ref(),
                gaps: &self.gaps,
                policy: &self.options.policy,
                sde_version: self.pack.sde_version(),
                generated_at,
            },
            self.options.limits,
        );
        let gate = evaluate_gate(&summary, &self.options.gate);
        let backlog = build_backlog(&self.rows, &gate);
        info!(
            pass = gate.pass,
            active_phase = gate.active_phase.as_deref().unwrap_or("none"),
            backlog_items = backlog.items.len(),
            "parity run reported"
        );
        Ok(ParityReport {
            summary,
            gate,
            backlog,
            rows: self.rows,
            gaps: self.gaps,
            sync: self.sync,
            cancelled_fits: self.cancelled_fits,
        })
    }
}
