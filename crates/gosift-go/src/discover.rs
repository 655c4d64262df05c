//! Test discovery per package (stage L3).
//!
//! A function is a test iff its name starts with `Test`, it takes at least
//! one parameter (the harness handle), and it is a free function. Method
//! declarations are a different node kind, so the third condition falls out
//! of the walk.
//!
//! Discovery covers the changed packages plus their direct importers: a
//! test in a downstream package can reference a changed symbol through an
//! import, and the detector can only see tests that were discovered.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use tree_sitter::Node;

use gosift_core::adapter::BuildOracle;
use gosift_core::types::{Origin, PackageId, Test};

use crate::syntax::{self, has_parameters, imports_of, named_children, node_line, node_text};

/// Discover the test functions of the given packages.
///
/// Packages the oracle cannot place and files that fail to parse are
/// skipped, not propagated.
pub fn discover_tests(packages: &[PackageId], oracle: &dyn BuildOracle) -> Vec<Test> {
    let mut tests = Vec::new();
    for package in packages {
        let Some(dir) = oracle.package_dir(package) else {
            debug!(package = %package, "no directory for package, skipping discovery");
            continue;
        };
        for file in test_files_in(&dir) {
            tests.extend(discover_in_file(&file, package));
        }
    }
    tests
}

/// Workspace packages that directly import one of the `changed` packages.
///
/// Scans every file (tests included) of every workspace package for an
/// import of a changed path. The scan reads imports off possibly-broken
/// trees, so a half-edited file still counts its intact import block.
pub fn dependent_packages(changed: &[PackageId], oracle: &dyn BuildOracle) -> Vec<PackageId> {
    let targets: HashSet<&str> = changed.iter().map(|p| p.as_str()).collect();
    let mut dependents = Vec::new();

    for package in oracle.workspace_packages() {
        if targets.contains(package.as_str()) {
            continue;
        }
        let Some(dir) = oracle.package_dir(&package) else {
            continue;
        };
        if package_imports_any(&dir, &targets) {
            dependents.push(package);
        }
    }
    dependents
}

fn package_imports_any(dir: &Path, targets: &HashSet<&str>) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_go = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".go"));
        if !is_go {
            continue;
        }
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Ok(tree) = syntax::parse(&text) else {
            continue;
        };
        if imports_of(tree.root_node(), &text)
            .iter()
            .any(|imp| targets.contains(imp.path.as_str()))
        {
            return true;
        }
    }
    false
}

/// Sorted `*_test.go` files of a directory.
fn test_files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        debug!(dir = %dir.display(), "failed to list package directory");
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_test.go"))
        })
        .collect();
    files.sort();
    files
}

fn discover_in_file(path: &Path, package: &PackageId) -> Vec<Test> {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Ok(text) = std::fs::read_to_string(path) else {
        debug!(file = %base, "failed to read test file, skipping");
        return Vec::new();
    };
    let tree = match syntax::parse_valid(&text, &base) {
        Ok(tree) => tree,
        Err(err) => {
            debug!(file = %base, error = %err, "failed to parse test file, skipping");
            return Vec::new();
        }
    };

    let mut tests = Vec::new();
    for node in named_children(tree.root_node()) {
        if node.kind() != "function_declaration" {
            continue;
        }
        if !is_test_function(node, &text) {
            continue;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            continue;
        };
        tests.push(Test {
            package: package.clone(),
            name: node_text(name_node, &text).to_string(),
            file: base.clone(),
            origin: Origin::new(base.clone(), node_line(node)),
        });
    }
    tests
}

/// The test-function convention for a free function declaration node.
pub fn is_test_function(func: Node<'_>, source: &str) -> bool {
    let Some(name) = func.child_by_field_name("name") else {
        return false;
    };
    node_text(name, source).starts_with("Test") && has_parameters(func)
}

// ============================================================================
// Tests
// ============================================================================
