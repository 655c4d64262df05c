//! Traits for the external collaborators the pipeline consumes.
//!
//! The core never talks to `git` or `go` directly; it sees two capabilities:
//!
//! - [`ChangeSource`] yields the changed-file lists between two revisions and
//!   for the uncommitted working tree.
//! - [`BuildOracle`] maps a source directory to its canonical import path and
//!   an import path back to its on-disk directory.
//!
//! The CLI crate implements both over the real toolchains; tests implement
//! them in memory, which keeps the whole analysis pipeline runnable against
//! fixture directories without a Go toolchain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::SiftResult;
use crate::types::PackageId;

// ============================================================================
// Change Source
// ============================================================================

/// Capability producing lists of changed file paths, workspace-relative.
///
/// Both methods return raw VCS output split into lines; filtering to Go
/// sources and de-duplication are the pipeline's job. An invocation failure
/// is fatal, so both return `SiftResult`.
pub trait ChangeSource {
    /// Files changed between `base` and `head`.
    fn committed(&self, base: &str, head: &str) -> SiftResult<Vec<String>>;

    /// Files with staged or unstaged edits against the working-tree head.
    fn uncommitted(&self) -> SiftResult<Vec<String>>;
}

// ============================================================================
// Build Oracle
// ============================================================================

/// Capability resolving packages through the build system.
///
/// Misses return `None`; whether a miss degrades (symbol attribution falls
/// back to the directory base name, test discovery skips the package) or is
/// surfaced is decided by the caller.
pub trait BuildOracle {
    /// Canonical import path of the package owning `dir` (workspace-relative
    /// or absolute).
    fn import_path(&self, dir: &Path) -> Option<String>;

    /// On-disk directory of the package named by `package`.
    fn package_dir(&self, package: &PackageId) -> Option<PathBuf>;

    /// Every package of the workspace, for the reverse-dependency scan that
    /// pulls downstream test packages into discovery. An empty answer
    /// degrades discovery to the changed packages alone.
    fn workspace_packages(&self) -> Vec<PackageId>;
}

// ============================================================================
// Static Oracle (test support)
// ============================================================================

/// A [`BuildOracle`] backed by fixed maps.
///
/// Used by unit and fixture tests across the workspace; production code
/// always goes through the `go list` implementation in the CLI crate.
#[derive(Debug, Default)]
pub struct StaticOracle {
    dirs_to_paths: HashMap<PathBuf, String>,
    paths_to_dirs: HashMap<String, PathBuf>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package under both query directions.
    pub fn insert(&mut self, import_path: impl Into<String>, dir: impl Into<PathBuf>) {
        let import_path = import_path.into();
        let dir = dir.into();
        self.dirs_to_paths.insert(dir.clone(), import_path.clone());
        self.paths_to_dirs.insert(import_path, dir);
    }
}

impl BuildOracle for StaticOracle {
    fn import_path(&self, dir: &Path) -> Option<String> {
        self.dirs_to_paths.get(dir).cloned()
    }

    fn package_dir(&self, package: &PackageId) -> Option<PathBuf> {
        self.paths_to_dirs.get(package.as_str()).cloned()
    }

    fn workspace_packages(&self) -> Vec<PackageId> {
        let mut packages: Vec<PackageId> = self
            .paths_to_dirs
            .keys()
            .map(|p| PackageId::new(p.clone()))
            .collect();
        packages.sort();
        packages
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_oracle_round_trips() {
        let mut oracle = StaticOracle::new();
        oracle.insert("proj/shop", "/ws/shop");

        assert_eq!(
            oracle.import_path(Path::new("/ws/shop")),
            Some("proj/shop".to_string())
        );
        assert_eq!(
            oracle.package_dir(&PackageId::new("proj/shop")),
            Some(PathBuf::from("/ws/shop"))
        );
    }

    #[test]
    fn static_oracle_misses_return_none() {
        let oracle = StaticOracle::new();
        assert!(oracle.import_path(Path::new("/nowhere")).is_none());
        assert!(oracle.package_dir(&PackageId::new("proj/missing")).is_none());
    }
}
