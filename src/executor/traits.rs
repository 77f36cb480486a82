//! Command execution seam
//!
//! Everything that reaches the outside world goes through [`CommandRunner`],
//! so steps can be exercised against a scripted runner in tests.

use super::shell::ShellResult;
use crate::error::Result;

/// Runs a single line of shell
pub trait CommandRunner: Send + Sync {
    /// Executes `command` and returns its output.
    ///
    /// A non-zero exit status is reported as [`crate::BuildError::CommandFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error when the command cannot be spawned or exits non-zero.
    fn run(&self, command: &str) -> Result<ShellResult>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    fn run(&self, command: &str) -> Result<ShellResult> {
        (**self).run(command)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, command: &str) -> Result<ShellResult> {
        (**self).run(command)
    }
}
