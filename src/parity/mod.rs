pub mod audit;
pub mod backlog;
pub mod compare;
pub mod corpus;
pub mod gate;
pub mod reference;
pub mod report;
pub mod runner;
pub mod summary;
pub mod tool;

pub use audit::{audit_pack, is_combat_relevant, render_markdown, CoverageAudit};
pub use backlog::{build_backlog, Backlog, BacklogItem, MechanicFamily};
pub use compare::{compare_results, relative_delta, ComparisonRow, MetricDelta, ThresholdPolicy};
pub use corpus::{fingerprint, infer_tags, Corpus, CorpusEntry, CorpusOrigin, InsertOutcome};
pub use gate::{evaluate_gate, GateConfig, GateEvaluation, GatePhase, HullCoverage, PhaseStatus};
pub use reference::{ReferenceLookup, ReferenceRevision, ReferenceStore};
pub use report::{write_audit_reports, write_parity_reports, ParityReport};
pub use runner::{reference_requests, ParityRun, RunOptions, RunState};
pub use summary::{MissingReason, MissingReference, ParitySummary, SummaryLimits};
pub use tool::{
    fetch_references, CommandReferenceTool, FetchOptions, ReferenceRequest, ReferenceTool,
    SyncReport,
};
