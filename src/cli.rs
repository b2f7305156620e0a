use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::data::{
    describe_pack, load_manifest, load_pack, read_pack_file, validate_pack_file,
    ValidationSeverity,
};
use crate::engine::calculate;
use crate::fit::{normalize_eft, parse_eft};
use crate::parallel::{CancellationFlag, WorkerPool};
use crate::parity::corpus::{fingerprint, infer_tags, load_golden_ids};
use crate::parity::reference::ImportDocument;
use crate::parity::{
    audit_pack, fetch_references, reference_requests, write_audit_reports, write_parity_reports,
    CommandReferenceTool, Corpus, CorpusEntry, CorpusOrigin, InsertOutcome, ParityReport,
    ParityRun, ReferenceStore, RunOptions, SyncReport,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const USAGE: &str = "usage: dogma-parity <calc|parity|import-refs|corpus-add|audit|validate>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Calc,
    Parity,
    ImportRefs,
    CorpusAdd,
    Audit,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("calc") => Some(Command::Calc),
        Some("parity") => Some(Command::Parity),
        Some("import-refs") => Some(Command::ImportRefs),
        Some("corpus-add") => Some(Command::CorpusAdd),
        Some("audit") => Some(Command::Audit),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Calc) => handle_calc(args),
        Some(Command::Parity) => handle_parity(args),
        Some(Command::ImportRefs) => handle_import_refs(args),
        Some(Command::CorpusAdd) => handle_corpus_add(args),
        Some(Command::Audit) => handle_audit(),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

fn exit_code(command: &str, outcome: CliResult<i32>) -> i32 {
    outcome.unwrap_or_else(|err| {
        eprintln!("{command} failed: {err}");
        1
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_calc(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: dogma-parity calc <eft-file> [fit-id]");
        return 2;
    };
    exit_code("calc", calc(Path::new(path), args.get(3).map(String::as_str)))
}

fn calc(path: &Path, fit_id: Option<&str>) -> CliResult<i32> {
    let config = HarnessConfig::load()?;
    let pack = load_pack(&config.manifest_path)?;
    let text = fs::read_to_string(path)?;
    let fit_id = fit_id
        .map(str::to_string)
        .or_else(|| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "fit".to_string());

    let parsed = parse_eft(&pack, &fit_id, &text)?;
    let metrics = calculate(&pack, &parsed.fit)?;
    let mut result = metrics.result;
    result
        .metadata
        .insert("coverageGaps".to_string(), metrics.coverage_gaps.len().into());
    if !parsed.unknown_lines.is_empty() {
        result
            .metadata
            .insert("unknownLines".to_string(), parsed.unknown_lines.into());
    }
    print_json(&result)?;
    Ok(0)
}

fn handle_parity(args: &[String]) -> i32 {
    let fetch = args.iter().skip(2).any(|arg| arg == "--fetch");
    exit_code("parity", run_parity(fetch))
}

fn fetch_sync(
    config: &HarnessConfig,
    corpus: &Corpus,
    store: &mut ReferenceStore,
    sde_version: &str,
    cancel: &CancellationFlag,
) -> CliResult<Option<SyncReport>> {
    let Some(program) = config.reference_tool.program.clone() else {
        warn!("--fetch given but no reference tool is configured");
        return Ok(None);
    };
    let tool = CommandReferenceTool::new(program, config.reference_tool.args.clone());
    let requests = reference_requests(corpus, sde_version);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(async {
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling reference fetch");
                on_signal.cancel();
            }
        });
        fetch_references(
            &tool,
            requests,
            store,
            config.reference_tool.fetch_options(),
            cancel,
        )
        .await
    })?;
    Ok(Some(report))
}

fn run_parity(fetch: bool) -> CliResult<i32> {
    let config = HarnessConfig::load()?;
    let pack = load_pack(&config.manifest_path)?;
    let corpus = Corpus::load(&config.corpus_path)?;
    let mut store = ReferenceStore::open(&config.reference_path)?;
    let golden_ids = load_golden_ids(&config.golden_ids_path)?;
    let cancel = CancellationFlag::new();

    let sync = if fetch {
        fetch_sync(&config, &corpus, &mut store, pack.sde_version(), &cancel)?
    } else {
        None
    };

    let options = RunOptions {
        policy: config.threshold.clone(),
        gate: config.gate.clone(),
        limits: config.summary_limits(),
        pool: WorkerPool::with_workers(config.workers),
        require_matching_data_version: config.require_matching_data_version,
        golden_ids,
    };
    let mut run = ParityRun::new(&pack, &corpus, options, cancel);
    run.collect_references(&store, sync)?;
    run.compare()?;
    let report: ParityReport = run.report(chrono::Utc::now().to_rfc3339())?;

    write_parity_reports(&config.reports_dir, &report)?;
    let audit = audit_pack(&pack, Some(&report.gaps), report.summary.generated_at.clone());
    write_audit_reports(&config.reports_dir, &audit)?;

    print_json(&serde_json::json!({
        "pass": report.passed(),
        "comparedFits": report.summary.compared_fits,
        "failingFits": report.summary.failing_fits,
        "missingReferences": report.summary.missing_references.len(),
        "activePhase": report.gate.active_phase,
        "reasons": report.gate.reasons,
    }))?;
    Ok(if report.passed() { 0 } else { 1 })
}

fn handle_import_refs(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: dogma-parity import-refs <file>");
        return 2;
    };
    exit_code("import-refs", import_refs(Path::new(path)))
}

fn import_refs(path: &Path) -> CliResult<i32> {
    let config = HarnessConfig::load()?;
    let raw = fs::read_to_string(path)?;
    let document: ImportDocument = serde_json::from_str(&raw)?;
    let mut store = ReferenceStore::open(&config.reference_path)?;
    let summary = store.import(document.into_rows(), "pyfa-manual")?;
    info!(
        imported = summary.imported,
        new_fits = summary.new_fits,
        updated_fits = summary.updated_fits,
        "imported references"
    );
    print_json(&summary)?;
    Ok(if summary.rejected.is_empty() { 0 } else { 1 })
}

fn handle_corpus_add(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: dogma-parity corpus-add <eft-file> [zkill|manual|svcfitstat]");
        return 2;
    };
    let origin = match args.get(3) {
        None => CorpusOrigin::Manual,
        Some(raw) => match CorpusOrigin::parse(raw) {
            Some(origin) => origin,
            None => {
                eprintln!("unknown origin '{raw}', expected zkill, manual or svcfitstat");
                return 2;
            }
        },
    };
    exit_code("corpus-add", corpus_add(Path::new(path), origin))
}

fn corpus_add(path: &Path, origin: CorpusOrigin) -> CliResult<i32> {
    let config = HarnessConfig::load()?;
    let pack = load_pack(&config.manifest_path)?;
    let text = fs::read_to_string(path)?;
    let eft = normalize_eft(&text)?;
    let key = fingerprint(&eft);
    let fit_id = format!("{}-{}", origin_prefix(origin), &key[..12]);
    let parsed = parse_eft(&pack, &fit_id, &eft)?;

    let mut corpus = Corpus::load(&config.corpus_path)?;
    let outcome = corpus.insert(CorpusEntry {
        fit_id: fit_id.clone(),
        ship_type_id: parsed.fit.hull_type_id(),
        tags: infer_tags(&eft),
        eft,
        origin,
    });
    match outcome {
        InsertOutcome::Added => {
            corpus.save(&config.corpus_path)?;
            println!("added {fit_id}");
        }
        InsertOutcome::DuplicateFingerprint { existing_fit_id } => {
            println!("duplicate of {existing_fit_id}, not added");
        }
        InsertOutcome::DuplicateFitId => println!("{fit_id} already present"),
    }
    Ok(0)
}

fn origin_prefix(origin: CorpusOrigin) -> &'static str {
    match origin {
        CorpusOrigin::Zkill => "zkill",
        CorpusOrigin::Manual => "manual",
        CorpusOrigin::Svcfitstat => "svcfitstat",
    }
}

fn handle_audit() -> i32 {
    exit_code("audit", audit())
}

fn audit() -> CliResult<i32> {
    let config = HarnessConfig::load()?;
    let pack = load_pack(&config.manifest_path)?;
    let audit = audit_pack(&pack, None, chrono::Utc::now().to_rfc3339());
    let written = write_audit_reports(&config.reports_dir, &audit)?;
    println!(
        "ships: {} unmodeled ({} combat-relevant); modules: {} unmodeled ({} combat-relevant)",
        audit.ships.unmodeled_effects,
        audit.ships.combat_focus.len(),
        audit.modules.unmodeled_effects,
        audit.modules.combat_focus.len()
    );
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(0)
}

fn handle_validate(args: &[String]) -> i32 {
    exit_code("validate", validate(args.get(2).map(Path::new)))
}

fn validate(manifest_arg: Option<&Path>) -> CliResult<i32> {
    let manifest_path = match manifest_arg {
        Some(path) => path.to_path_buf(),
        None => HarnessConfig::load()?.manifest_path,
    };
    let manifest = load_manifest(&manifest_path)?;
    let pack_file = read_pack_file(&manifest.pack_path(&manifest_path))?;
    let mut report = validate_pack_file(&pack_file);
    if !report.has_errors() {
        match load_pack(&manifest_path) {
            Ok(pack) => println!("validation passed: {}", describe_pack(&pack)),
            Err(err) => report.push(ValidationSeverity::Error, "manifest", err.to_string()),
        }
    }
    for diagnostic in &report.diagnostics {
        eprintln!("- {diagnostic}");
    }
    if report.has_errors() {
        eprintln!(
            "validation failed: {} error(s), {} warning(s)",
            report.count(ValidationSeverity::Error),
            report.count(ValidationSeverity::Warning)
        );
        return Ok(1);
    }
    Ok(0)
}
