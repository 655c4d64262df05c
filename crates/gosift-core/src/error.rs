//! Error types for surfaced failures.
//!
//! Only fatal conditions become a [`SiftError`]: a failed VCS invocation, an
//! unknown strategy name, a failing test-runner subprocess, or an IO error on
//! a path the pipeline cannot do without. Degrading conditions (a file that
//! does not parse, a package that does not load, an unresolved import path)
//! are handled at their call sites: logged at debug level, the affected item
//! dropped, the run continued.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type SiftResult<T> = Result<T, SiftError>;

/// Unified error type for everything the CLI surfaces to the user.
#[derive(Debug, Error)]
pub enum SiftError {
    /// The VCS diff source failed (spawn error or nonzero exit).
    #[error("failed to get changed files ({context}): {message}")]
    ChangeSource { context: String, message: String },

    /// `--strategy` named something outside the closed set.
    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    /// The test runner returned nonzero for a package.
    #[error("go test failed for package {package}")]
    RunnerFailed { package: String, code: Option<i32> },

    /// IO error surfaced from the workspace.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiftError {
    /// Create a change-source error with invocation context.
    pub fn change_source(context: impl Into<String>, message: impl Into<String>) -> Self {
        SiftError::ChangeSource {
            context: context.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_source_display_carries_context() {
        let err = SiftError::change_source("git diff main HEAD", "exit status 128");
        assert_eq!(
            err.to_string(),
            "failed to get changed files (git diff main HEAD): exit status 128"
        );
    }

    #[test]
    fn unknown_strategy_display_names_the_value() {
        let err = SiftError::UnknownStrategy {
            name: "optimistic".to_string(),
        };
        assert_eq!(err.to_string(), "unknown strategy: optimistic");
    }

    #[test]
    fn runner_failed_display_names_the_package() {
        let err = SiftError::RunnerFailed {
            package: "proj/shop".to_string(),
            code: Some(1),
        };
        assert_eq!(err.to_string(), "go test failed for package proj/shop");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SiftError = io.into();
        assert!(matches!(err, SiftError::Io(_)));
    }
}
