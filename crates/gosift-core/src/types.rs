//! Pipeline data model.
//!
//! Every stage of the pipeline consumes an owned container of these types and
//! produces a fresh one; nothing here is shared mutably across stages. All
//! types serialize with serde so the CLI can emit them in the JSON report.

use std::fmt;

use serde::Serialize;

// ============================================================================
// Package Identity
// ============================================================================

/// Canonical import path of a Go package (e.g. `project/internal/shop`).
///
/// Produced by the build oracle; uniquely identifies a package for every
/// downstream stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageId(pub String);

impl PackageId {
    pub fn new(path: impl Into<String>) -> Self {
        PackageId(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        PackageId(s.to_string())
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        PackageId(s)
    }
}

// ============================================================================
// Origin
// ============================================================================

/// Definition site used for diagnostics only. Renders as `file:line`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    /// Base file name (not a full path).
    pub file: String,
    /// 1-indexed line number.
    pub line: u32,
}

impl Origin {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Origin {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// Kind of a top-level definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Func,
    Method,
    Type,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Func => "func",
            SymbolKind::Method => "method",
            SymbolKind::Type => "type",
        };
        f.write_str(s)
    }
}

/// A top-level definition introduced by a changed file.
///
/// `(package, name, kind)` is the semantic key: records agreeing on it are
/// the same symbol and are collapsed during extraction. The receiver string
/// is display-only; method identity is established semantically in the usage
/// detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    /// Owning package.
    pub package: PackageId,
    /// Defined identifier.
    pub name: String,
    pub kind: SymbolKind,
    /// Stringified receiver type, `Some` iff `kind == Method`. Pointer
    /// receivers carry a `*` prefix; generic receivers drop type parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Visible outside the package (leading-uppercase name).
    pub exported: bool,
    pub origin: Origin,
}

impl Symbol {
    /// The semantic key used for de-duplication and matching.
    pub fn key(&self) -> (&str, &str, SymbolKind) {
        (self.package.as_str(), &self.name, self.kind)
    }
}

// ============================================================================
// Tests
// ============================================================================

/// A discovered test function. `(package, name)` is unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Test {
    pub package: PackageId,
    pub name: String,
    /// Base name of the `_test.go` file declaring the function.
    pub file: String,
    pub origin: Origin,
}

// ============================================================================
// Usage Edges
// ============================================================================

/// A directed edge asserting that a test body semantically references a
/// changed symbol. `(test_name, symbol_name, symbol_kind)` is unique in a
/// result set; duplicates from multiple syntactic occurrences collapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub test_name: String,
    pub test_origin: Origin,
    pub symbol_name: String,
    pub symbol_kind: SymbolKind,
}

impl Usage {
    /// De-duplication key for the result set.
    pub fn key(&self) -> (&str, &str, SymbolKind) {
        (&self.test_name, &self.symbol_name, self.symbol_kind)
    }
}

// ============================================================================
// Test Jobs
// ============================================================================

/// One selected test, addressed for execution. Unique within the selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TestJob {
    pub package: PackageId,
    pub test_name: String,
}

impl TestJob {
    pub fn new(package: impl Into<PackageId>, test_name: impl Into<String>) -> Self {
        TestJob {
            package: package.into(),
            test_name: test_name.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
