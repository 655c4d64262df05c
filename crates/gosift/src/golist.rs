//! `go list`-backed build oracle.
//!
//! Three queries, all run in the workspace root:
//! - `go list -f '{{.ImportPath}}' <dir>` resolves a directory to its
//!   canonical import path,
//! - `go list -f '{{.Dir}}' <pkg>` resolves an import path to its on-disk
//!   directory,
//! - `go list ./...` enumerates the workspace packages for the
//!   reverse-dependency scan.
//!
//! Every miss is `None`/empty with a debug log; the callers decide whether
//! that degrades or surfaces.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use gosift_core::adapter::BuildOracle;
use gosift_core::types::PackageId;

/// [`BuildOracle`] over the `go` CLI.
pub struct GoListOracle {
    workspace: PathBuf,
}

impl GoListOracle {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        GoListOracle {
            workspace: workspace.into(),
        }
    }

    fn go_list(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("go")
            .arg("list")
            .args(args)
            .current_dir(&self.workspace)
            .output()
            .map_err(|e| {
                debug!(error = %e, "failed to spawn go list");
                e
            })
            .ok()?;
        if !output.status.success() {
            debug!(
                query = %args.join(" "),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "go list returned nonzero"
            );
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            None
        } else {
            Some(stdout)
        }
    }
}

/// Argument form `go list` expects for a directory query: absolute paths
/// pass through, relative ones get the `./` prefix.
fn dir_target(dir: &Path) -> String {
    if dir.is_absolute() {
        dir.display().to_string()
    } else {
        format!("./{}", dir.display())
    }
}

impl BuildOracle for GoListOracle {
    fn import_path(&self, dir: &Path) -> Option<String> {
        self.go_list(&["-f", "{{.ImportPath}}", &dir_target(dir)])
    }

    fn package_dir(&self, package: &PackageId) -> Option<PathBuf> {
        self.go_list(&["-f", "{{.Dir}}", package.as_str()])
            .map(PathBuf::from)
    }

    fn workspace_packages(&self) -> Vec<PackageId> {
        self.go_list(&["./..."])
            .map(|out| out.lines().map(|l| PackageId::new(l.trim())).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_path_misses_outside_a_module() {
        // A bare tempdir has no go.mod; every query degrades to None.
        let tmp = tempfile::TempDir::new().unwrap();
        let oracle = GoListOracle::new(tmp.path());
        assert!(oracle.import_path(Path::new("nowhere")).is_none());
        assert!(oracle.package_dir(&PackageId::new("proj/none")).is_none());
        assert!(oracle.workspace_packages().is_empty());
    }

    #[test]
    fn relative_dirs_are_prefixed_for_go_list() {
        assert_eq!(dir_target(Path::new("internal/shop")), "./internal/shop");
        assert_eq!(dir_target(Path::new("/abs/shop")), "/abs/shop");
    }
}
