//! Git-backed change source (stage L1).
//!
//! Two invocations, both `--name-only`: the committed diff between the base
//! and head revisions, and the uncommitted diff against `HEAD` (staged and
//! unstaged edits alike). Git failures are fatal; the pipeline has nothing
//! to select without a diff.

use std::path::PathBuf;
use std::process::Command;

use gosift_core::adapter::ChangeSource;
use gosift_core::error::{SiftError, SiftResult};

/// [`ChangeSource`] over the `git` CLI, run in the workspace root.
pub struct GitChangeSource {
    workspace: PathBuf,
}

impl GitChangeSource {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        GitChangeSource {
            workspace: workspace.into(),
        }
    }

    fn diff_names(&self, args: &[&str]) -> SiftResult<Vec<String>> {
        let context = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workspace)
            .output()
            .map_err(|e| SiftError::change_source(context.clone(), e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("exit status {:?}", output.status.code()),
                text => text.to_string(),
            };
            return Err(SiftError::change_source(context, message));
        }

        Ok(parse_name_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl ChangeSource for GitChangeSource {
    fn committed(&self, base: &str, head: &str) -> SiftResult<Vec<String>> {
        self.diff_names(&["diff", "--name-only", base, head])
    }

    fn uncommitted(&self) -> SiftResult<Vec<String>> {
        self.diff_names(&["diff", "--name-only", "HEAD"])
    }
}

/// Split `--name-only` output into paths. A single empty token (git's output
/// for an empty diff) maps to the empty list, not an error.
fn parse_name_list(output: &str) -> Vec<String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.lines().map(|l| l.trim().to_string()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_maps_to_empty_list() {
        assert!(parse_name_list("").is_empty());
        assert!(parse_name_list("\n").is_empty());
        assert!(parse_name_list("   \n").is_empty());
    }

    #[test]
    fn lines_become_paths() {
        let parsed = parse_name_list("shop/cart.go\nshop/products.go\n");
        assert_eq!(parsed, vec!["shop/cart.go", "shop/products.go"]);
    }

    #[test]
    fn failure_in_a_non_repo_surfaces_with_context() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = GitChangeSource::new(tmp.path());
        let err = source.committed("main", "HEAD").unwrap_err();
        match err {
            SiftError::ChangeSource { context, .. } => {
                assert!(context.contains("git diff --name-only main HEAD"));
            }
            other => panic!("expected ChangeSource error, got {other:?}"),
        }
    }
}
