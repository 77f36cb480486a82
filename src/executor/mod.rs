//! Command execution layer
//!
//! This module contains the runner seam and the shell-backed implementation.

mod shell;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use shell::{ShellCommand, ShellConfig, ShellResult};
pub use traits::CommandRunner;
