//! Binary entry point for the gosift CLI.
//!
//! Diffs two git revisions (plus the uncommitted working tree), works out
//! which test functions can observe the change, and runs only those.
//!
//! ## Usage
//!
//! ```bash
//! # Run the tests affected by everything since main
//! gosift
//!
//! # Compare two explicit revisions, but only print the plan
//! gosift --base v1.4.0 --head HEAD --dry-run
//!
//! # Distrust the semantic pipeline and run whole changed packages
//! gosift --strategy conservative
//!
//! # Inspect what the pipeline resolved
//! gosift --debug-symbols --debug-types --dry-run
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, ValueEnum};

use gosift::pipeline::{self, DebugFlags, ReportFormat, RunOptions};

// ============================================================================
// CLI Structure
// ============================================================================

/// Change-driven test selection for Go.
///
/// gosift inspects the diff between two revisions, extracts the symbols the
/// edits touched, resolves which tests reference them through the type
/// information of each test package, and invokes `go test` with exactly the
/// affected test functions.
#[derive(Parser, Debug)]
#[command(name = "gosift", version, about = "Run only the Go tests a change can affect")]
struct Cli {
    /// Base revision for the committed diff.
    #[arg(long, default_value = "main")]
    base: String,

    /// Head revision for the committed diff.
    #[arg(long, default_value = "HEAD")]
    head: String,

    /// Print the planned test commands without executing them.
    #[arg(long)]
    dry_run: bool,

    /// Selection strategy: symbol-only, package-fallback, or conservative.
    ///
    /// Parsed by name at run time so an unknown value surfaces as a normal
    /// error naming the rejected value.
    #[arg(long, default_value = "package-fallback")]
    strategy: String,

    /// Workspace root directory (default: current directory).
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Selection report format.
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    #[command(flatten)]
    debug: DebugArgs,

    /// Log level for tracing output (written to stderr).
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Debug dump toggles; each prints one stage's view of the run.
#[derive(Args, Debug, Default)]
struct DebugArgs {
    /// Print the changed Go files after filtering.
    #[arg(long)]
    debug_files: bool,

    /// Print the symbols extracted from changed files.
    #[arg(long)]
    debug_symbols: bool,

    /// Print the discovered test functions.
    #[arg(long)]
    debug_tests: bool,

    /// Print the type-resolved usages of changed symbols in tests.
    #[arg(long)]
    debug_types: bool,

    /// Print the tests the strategy selected.
    #[arg(long)]
    debug_selection: bool,
}

/// Output format for the selection report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Human-readable messages (default).
    #[default]
    Text,
    /// Machine-readable JSON report.
    Json,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => ReportFormat::Text,
            Format::Json => ReportFormat::Json,
        }
    }
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let options = options_from(&cli);
    match pipeline::run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

fn options_from(cli: &Cli) -> RunOptions {
    let workspace = cli
        .workspace
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    RunOptions {
        workspace,
        base: cli.base.clone(),
        head: cli.head.clone(),
        dry_run: cli.dry_run,
        strategy: cli.strategy.clone(),
        format: cli.format.into(),
        debug: DebugFlags {
            files: cli.debug.debug_files,
            symbols: cli.debug.debug_symbols,
            tests: cli.debug.debug_tests,
            types: cli.debug.debug_types,
            selection: cli.debug.debug_selection,
        },
    }
}

/// Initialize tracing to stderr, `RUST_LOG` taking precedence over the flag.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

// ============================================================================
// Tests
// ============================================================================
