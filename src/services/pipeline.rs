//! Run pipeline: collect inputs, fan out per file, reduce, diff.
//!
//! Files are independent, so ingestion, classification, and the per-file
//! partial catalog run concurrently on blocking worker tasks. The fold into
//! the run-wide catalog and verdict tallies is the only shared-mutation
//! point and stays on the calling task. Diffing and rendering happen after
//! the full barrier.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::errors::EngineError;
use crate::models::{Catalog, DaemonFindings, DependencyFindings};
use crate::parsers;
use crate::services::baseline::RenderedReportBaseline;
use crate::services::trend::{self, TrendDiff};
use crate::services::{aggregate, classify, rules::RuleSet};

/// Inputs for one reporting run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Files or directories; directories are walked for report extensions.
    pub inputs: Vec<PathBuf>,
    /// Daemon rules YAML override; embedded default when `None`.
    pub daemon_rules_path: Option<PathBuf>,
    /// Previous cycle's rendered report for trend diffing.
    pub prev: Option<PathBuf>,
}

/// Everything the renderers need, produced once per run.
#[derive(Debug)]
pub struct RunOutcome {
    pub catalog: Catalog,
    pub daemons: DaemonFindings,
    pub dependencies: DependencyFindings,
    pub diff: TrendDiff,
    pub parsed_files: usize,
    pub skipped_files: usize,
}

/// Per-file partial result, produced concurrently.
struct FilePartial {
    catalog: Catalog,
    daemons: DaemonFindings,
    dependencies: DependencyFindings,
    findings: usize,
}

fn has_report_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("nessus") | Some("xml")
    )
}

/// Expand input paths: files pass through, directories are walked for
/// `.nessus`/`.xml`. Missing paths are logged and counted, not fatal here.
pub fn collect_input_files(inputs: &[PathBuf]) -> (Vec<PathBuf>, usize) {
    let mut files = Vec::new();
    let mut missing = 0;
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            for entry in walkdir::WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && has_report_extension(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            tracing::warn!(input = %input.display(), "Input path not found, skipping");
            missing += 1;
        }
    }
    (files, missing)
}

/// Parse and classify one file. Runs on a blocking worker.
fn process_file(
    path: &Path,
    daemon_rules: &RuleSet,
    dependency_rules: &RuleSet,
) -> Result<FilePartial, EngineError> {
    let findings = parsers::ingest_path(path)?;

    let mut daemons = DaemonFindings::default();
    let mut dependencies = DependencyFindings::default();
    for finding in &findings {
        classify::classify(
            finding,
            daemon_rules,
            dependency_rules,
            &mut daemons,
            &mut dependencies,
        );
    }
    let catalog = aggregate::aggregate(&findings);

    Ok(FilePartial {
        catalog,
        daemons,
        dependencies,
        findings: findings.len(),
    })
}

/// Run ingestion, classification, aggregation, and trend diffing.
///
/// Fails only when zero input files could be used; every per-file failure
/// is logged and skipped.
pub async fn run(options: &RunOptions) -> Result<RunOutcome, EngineError> {
    let (files, missing) = collect_input_files(&options.inputs);
    let total_inputs = files.len() + missing;
    if files.is_empty() {
        return Err(EngineError::NoUsableInput(total_inputs));
    }

    let daemon_rules = Arc::new(RuleSet::load_daemons(options.daemon_rules_path.as_deref())?);
    let dependency_rules = Arc::new(RuleSet::dependency_default());

    let mut tasks = JoinSet::new();
    for path in files {
        let daemon_rules = Arc::clone(&daemon_rules);
        let dependency_rules = Arc::clone(&dependency_rules);
        tasks.spawn_blocking(move || {
            let partial = process_file(&path, &daemon_rules, &dependency_rules);
            (path, partial)
        });
    }

    // Single-threaded reduce: the only shared-mutation point.
    let mut catalog = Catalog::new();
    let mut daemons = DaemonFindings::default();
    let mut dependencies = DependencyFindings::default();
    let mut parsed_files = 0usize;
    let mut skipped_files = missing;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((path, Ok(partial))) => {
                tracing::info!(
                    file = %path.display(),
                    findings = partial.findings,
                    "Processed report file"
                );
                catalog.merge(partial.catalog);
                daemons.merge(partial.daemons);
                dependencies.merge(partial.dependencies);
                parsed_files += 1;
            }
            Ok((path, Err(err))) => {
                tracing::error!(file = %path.display(), error = %err, "Skipping input file");
                skipped_files += 1;
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "Worker task failed");
                skipped_files += 1;
            }
        }
    }

    if parsed_files == 0 {
        return Err(EngineError::NoUsableInput(total_inputs));
    }

    let baseline = RenderedReportBaseline::new(options.prev.as_deref());
    let diff = trend::diff(&catalog, &baseline)?;

    Ok(RunOutcome {
        catalog,
        daemons,
        dependencies,
        diff,
        parsed_files,
        skipped_files,
    })
}
