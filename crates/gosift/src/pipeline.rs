//! The selection pipeline, end to end.
//!
//! A linear dataflow with a hard ordering between stages: change source →
//! symbol extraction → package mapping → test discovery → usage detection →
//! strategy → dispatch. Everything runs synchronously; the only concurrency
//! anywhere is the child processes (git, go) awaited to completion.
//!
//! Expected-empty outcomes (no changed Go files, no testable packages, an
//! empty selection) print a short message and return success.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use gosift_core::adapter::{BuildOracle, ChangeSource};
use gosift_core::error::SiftResult;
use gosift_core::output::{
    emit_report, render_selection, render_symbols, render_tests, render_usages, SelectionReport,
};
use gosift_core::strategy::strategy_by_name;
use gosift_core::types::PackageId;
use gosift_go::discover::{dependent_packages, discover_tests};
use gosift_go::symbols::extract_from_files;
use gosift_go::usage::detect_usages;

use crate::git::GitChangeSource;
use crate::golist::GoListOracle;
use crate::runner;

// ============================================================================
// Options
// ============================================================================

/// Selection report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human messages and (under the debug flags) textual dumps.
    #[default]
    Text,
    /// A machine-readable selection report on stdout.
    Json,
}

/// Debug dump toggles, all off by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub files: bool,
    pub symbols: bool,
    pub tests: bool,
    pub types: bool,
    pub selection: bool,
}

/// One pipeline invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workspace: PathBuf,
    pub base: String,
    pub head: String,
    pub dry_run: bool,
    pub strategy: String,
    pub format: ReportFormat,
    pub debug: DebugFlags,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the pipeline against the real git and go toolchains.
pub fn run(options: &RunOptions) -> SiftResult<()> {
    let source = GitChangeSource::new(&options.workspace);
    let oracle = GoListOracle::new(&options.workspace);
    run_with(options, &source, &oracle)
}

/// Run the pipeline with explicit collaborators (the seam tests use).
pub fn run_with(
    options: &RunOptions,
    source: &dyn ChangeSource,
    oracle: &dyn BuildOracle,
) -> SiftResult<()> {
    let files = changed_go_files(source, &options.base, &options.head)?;
    if options.debug.files {
        println!("Affected Go files:");
        for file in &files {
            println!("  {file}");
        }
        println!();
    }
    if files.is_empty() {
        println!("No Go files changed. Nothing to test.");
        return Ok(());
    }

    let symbols = extract_from_files(&files, &options.workspace, oracle);
    if options.debug.symbols {
        println!("{}", render_symbols(&symbols));
    }

    let changed_packages = map_files_to_packages(&files, &options.workspace, oracle);
    if changed_packages.is_empty() {
        println!("No testable packages found for changed files.");
        return Ok(());
    }

    let mut candidates = changed_packages.clone();
    candidates.extend(dependent_packages(&changed_packages, oracle));
    debug!(count = candidates.len(), "candidate packages for discovery");

    let tests = discover_tests(&candidates, oracle);
    if options.debug.tests {
        println!("{}", render_tests(&tests));
    }

    let usages = detect_usages(&tests, &symbols, oracle);
    if options.debug.types {
        println!("{}", render_usages(&usages));
    }

    let strategy = strategy_by_name(&options.strategy)?;
    let jobs = strategy.select(&symbols, &tests, &usages);
    if options.debug.selection {
        println!("{}", render_selection(strategy.name(), &jobs));
    }

    if let ReportFormat::Json = options.format {
        let report = SelectionReport::new(
            strategy.name(),
            jobs.clone(),
            runner::plan_commands(&jobs),
        );
        emit_report(&report, &mut io::stdout())?;
        if options.dry_run {
            return Ok(());
        }
    } else if jobs.is_empty() {
        println!("No tests selected by strategy. Nothing to run.");
        return Ok(());
    } else if options.dry_run {
        println!("{}", runner::plan_line(&jobs));
        return Ok(());
    }

    if jobs.is_empty() {
        return Ok(());
    }
    runner::execute(&options.workspace, &jobs)
}

// ============================================================================
// Stage L1 Helpers
// ============================================================================

/// Committed plus uncommitted changes, de-duplicated (first occurrence
/// wins), restricted to non-vendored Go sources.
pub fn changed_go_files(
    source: &dyn ChangeSource,
    base: &str,
    head: &str,
) -> SiftResult<Vec<String>> {
    let mut files = source.committed(base, head)?;
    files.extend(source.uncommitted()?);
    Ok(filter_go_files(dedup_files(files)))
}

/// First-occurrence-wins de-duplication.
pub fn dedup_files(files: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    files
        .into_iter()
        .filter(|file| seen.insert(file.clone()))
        .collect()
}

/// Keep `.go` sources outside any `vendor/` tree.
pub fn filter_go_files(files: Vec<String>) -> Vec<String> {
    files
        .into_iter()
        .filter(|file| {
            file.ends_with(".go")
                && !file.starts_with("vendor/")
                && !file.contains("/vendor/")
        })
        .collect()
}

/// Packages owning the changed files, deduplicated, oracle misses skipped.
fn map_files_to_packages(files: &[String], workspace: &Path, oracle: &dyn BuildOracle) -> Vec<PackageId> {
    let mut packages: Vec<PackageId> = Vec::new();
    for file in files {
        let dir = Path::new(file).parent().unwrap_or_else(|| Path::new(""));
        let Some(path) = oracle.import_path(&workspace.join(dir)) else {
            debug!(file = %file, "no import path for changed file, skipping");
            continue;
        };
        let package = PackageId::new(path);
        if !packages.contains(&package) {
            packages.push(package);
        }
    }
    packages
}

// ============================================================================
// Tests
// ============================================================================
