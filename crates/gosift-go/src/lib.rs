//! Go source analysis for gosift.
//!
//! This crate owns everything that reads Go code:
//! - `syntax`: tree-sitter parsing and node helpers
//! - `package`: package loading into semantic models with definition objects
//! - `typetrack`: local variable type tracking inside function bodies
//! - `resolve`: reference resolution over a test function body
//! - `symbols`: top-level symbol extraction from changed files
//! - `discover`: test-function discovery per package
//! - `usage`: the change-impact detector tying the above together

pub mod discover;
pub mod package;
pub mod resolve;
pub mod symbols;
pub mod syntax;
pub mod typetrack;
pub mod usage;
