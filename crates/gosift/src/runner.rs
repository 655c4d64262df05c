//! Test execution dispatch (stage L6).
//!
//! Jobs group by package; each package runs once with an anchored
//! alternation of its selected test names. Output streams through verbatim,
//! and the first failing package aborts the run with its path attached.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Stdio};

use gosift_core::error::{SiftError, SiftResult};
use gosift_core::types::TestJob;

/// Group jobs by package, packages and names in deterministic order.
pub fn group_jobs(jobs: &[TestJob]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for job in jobs {
        grouped
            .entry(job.package.as_str().to_string())
            .or_default()
            .push(job.test_name.clone());
    }
    grouped
}

/// The `-run` pattern for a package's selected tests: `^(A|B|…)$`.
pub fn run_pattern(test_names: &[String]) -> String {
    format!("^({})$", test_names.join("|"))
}

/// The planned `go test` invocations, one per package.
pub fn plan_commands(jobs: &[TestJob]) -> Vec<String> {
    group_jobs(jobs)
        .into_iter()
        .map(|(package, names)| format!("go test {package} -run '{}'", run_pattern(&names)))
        .collect()
}

/// The dry-run plan as a single printable line, `&&`-joined across packages.
pub fn plan_line(jobs: &[TestJob]) -> String {
    plan_commands(jobs).join(" && ")
}

/// Execute the selected tests package by package.
///
/// Stdout/stderr are inherited so `go test` output streams straight through.
/// The first nonzero exit aborts; later packages do not run.
pub fn execute(workspace: &Path, jobs: &[TestJob]) -> SiftResult<()> {
    for (package, names) in group_jobs(jobs) {
        let pattern = run_pattern(&names);
        let status = Command::new("go")
            .args(["test", &package, "-run", &pattern])
            .current_dir(workspace)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        if !status.success() {
            return Err(SiftError::RunnerFailed {
                package,
                code: status.code(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
