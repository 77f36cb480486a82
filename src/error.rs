//! Error types for build steps

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// Errors that can occur while validating, rendering or running a build
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The configuration failed validation
    #[error("Configuration validation failed with {count} error(s): {}", .errors.join("; "))]
    Configuration {
        /// Number of validation errors.
        count: usize,
        /// Individual error messages.
        errors: Vec<String>,
    },

    /// A required variable could not be resolved from any source
    #[error("Required variable '{name}' is not set: {hint}")]
    MissingVariable {
        /// Variable name.
        name: String,
        /// How to provide it.
        hint: String,
    },

    /// The Dockerfile referenced by the configuration does not exist
    #[error("Dockerfile not found: {}", .path.display())]
    Precondition {
        /// Path that was checked.
        path: PathBuf,
    },

    /// External command failed after all retries
    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    Execution {
        /// Operation name passed to the retry wrapper.
        operation: String,
        /// Number of primary attempts made.
        attempts: usize,
        /// Final error message.
        message: String,
        /// Suggestions from the error classifier.
        suggestions: Vec<String>,
        /// Raw context (usually the rendered command line).
        context: String,
    },

    /// Command exited with a non-zero status
    #[error("Command failed with exit code {code}: {stderr}")]
    CommandFailed {
        /// Exit code returned by the command.
        code: i32,
        /// Standard error output from the command.
        stderr: String,
    },

    /// Configuration file could not be parsed
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl BuildError {
    /// Returns true if the error may go away on retry.
    ///
    /// Only command execution is retried; a static misconfiguration stays broken.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CommandFailed { .. } | Self::Io(_))
    }

    /// Suggestions attached to the error, if any
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Execution { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_includes_count() {
        let err = BuildError::Configuration {
            count: 2,
            errors: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 error(s)"));
        assert!(msg.contains("a; b"));
    }

    #[test]
    fn test_precondition_error_mentions_path() {
        let err = BuildError::Precondition {
            path: PathBuf::from("./Dockerfile.missing"),
        };
        assert!(err.to_string().contains("Dockerfile.missing"));
    }

    #[test]
    fn test_only_execution_errors_are_retryable() {
        assert!(
            BuildError::CommandFailed {
                code: 1,
                stderr: String::new()
            }
            .is_retryable()
        );
        assert!(
            !BuildError::Configuration {
                count: 1,
                errors: vec![]
            }
            .is_retryable()
        );
        assert!(
            !BuildError::Precondition {
                path: PathBuf::from("x")
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: BuildError = std::io::Error::other("disk gone").into();
        assert_eq!(err, BuildError::Io("disk gone".to_string()));
    }
}
