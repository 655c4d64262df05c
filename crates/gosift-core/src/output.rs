//! Output rendering: debug dumps and the JSON selection report.
//!
//! The `--debug-*` flags print the textual dumps produced here; they exist
//! for humans inspecting a run and are not a stable format. The JSON report
//! behind `--format json` is the machine surface.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::types::{Symbol, SymbolKind, Test, TestJob, Usage};

// ============================================================================
// Debug Dumps
// ============================================================================

/// Render the extracted-symbol dump for `--debug-symbols`.
pub fn render_symbols(symbols: &[Symbol]) -> String {
    if symbols.is_empty() {
        return "No symbols found.".to_string();
    }

    let mut out = String::from("\n=== Extracted Symbols ===\n\n");
    for sym in symbols {
        let visibility = if sym.exported { "exported" } else { "unexported" };
        match sym.kind {
            SymbolKind::Method => {
                let receiver = sym.receiver.as_deref().unwrap_or("?");
                out.push_str(&format!(
                    "[{visibility}] method ({receiver}) {}.{} at {}\n",
                    sym.package, sym.name, sym.origin
                ));
            }
            _ => {
                out.push_str(&format!(
                    "[{visibility}] {} {}.{} at {}\n",
                    sym.kind, sym.package, sym.name, sym.origin
                ));
            }
        }
    }
    out.push_str(&format!("\nTotal: {} symbols\n", symbols.len()));
    out
}

/// Render the discovered-test dump for `--debug-tests`.
pub fn render_tests(tests: &[Test]) -> String {
    if tests.is_empty() {
        return "No tests found.".to_string();
    }

    let mut by_package: BTreeMap<&str, Vec<&Test>> = BTreeMap::new();
    for test in tests {
        by_package.entry(test.package.as_str()).or_default().push(test);
    }

    let mut out = String::from("\n=== Discovered Tests ===\n\n");
    for (package, package_tests) in by_package {
        out.push_str(&format!("Package: {package}\n"));
        for test in package_tests {
            out.push_str(&format!("  - {} at {}\n", test.name, test.origin));
        }
        out.push('\n');
    }
    out.push_str(&format!("Total: {} tests\n", tests.len()));
    out
}

/// Render the resolved-usage dump for `--debug-types`.
pub fn render_usages(usages: &[Usage]) -> String {
    if usages.is_empty() {
        return "No usages detected.".to_string();
    }

    let mut by_test: BTreeMap<String, Vec<&Usage>> = BTreeMap::new();
    for usage in usages {
        let key = format!("{} ({})", usage.test_name, usage.test_origin);
        by_test.entry(key).or_default().push(usage);
    }

    let mut out = String::from("\n=== Detected Usages (Type-Based) ===\n\n");
    for (test, test_usages) in by_test {
        out.push_str(&format!("Test: {test}\n"));
        for usage in test_usages {
            out.push_str(&format!("  - uses {} {}\n", usage.symbol_kind, usage.symbol_name));
        }
        out.push('\n');
    }
    out.push_str(&format!("Total: {} precise usages detected\n", usages.len()));
    out
}

/// Render the selected-job dump for `--debug-selection`.
pub fn render_selection(strategy: &str, jobs: &[TestJob]) -> String {
    if jobs.is_empty() {
        return format!("\n=== Test Selection ({strategy}) ===\n\nNo tests selected.\n");
    }

    let mut by_package: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for job in jobs {
        by_package
            .entry(job.package.as_str())
            .or_default()
            .push(&job.test_name);
    }

    let mut out = format!("\n=== Test Selection ({strategy}) ===\n\n");
    for (package, names) in by_package {
        out.push_str(&format!("Package: {package}\n"));
        for name in names {
            out.push_str(&format!("  - {name}\n"));
        }
        out.push('\n');
    }
    out.push_str(&format!("Total: {} tests selected\n", jobs.len()));
    out
}

// ============================================================================
// JSON Report
// ============================================================================

/// Machine-readable summary of a selection run, emitted by `--format json`.
#[derive(Debug, Serialize)]
pub struct SelectionReport {
    pub strategy: String,
    pub jobs: Vec<TestJob>,
    /// The `go test` invocations the dispatcher would run, in order.
    pub commands: Vec<String>,
}

impl SelectionReport {
    pub fn new(strategy: impl Into<String>, jobs: Vec<TestJob>, commands: Vec<String>) -> Self {
        SelectionReport {
            strategy: strategy.into(),
            jobs,
            commands,
        }
    }
}

/// Emit a report as pretty JSON to a writer.
pub fn emit_report<T: Serialize>(report: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

// ============================================================================
// Tests
// ============================================================================
