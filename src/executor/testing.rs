//! Scripted runner for unit tests

use super::shell::ShellResult;
use super::traits::CommandRunner;
use crate::error::{BuildError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Replays queued results and records every command it was asked to run.
///
/// Once the queue is empty every command succeeds with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    results: Mutex<VecDeque<Result<ShellResult>>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, stdout: &str) -> Self {
        self.results.lock().push_back(Ok(ShellResult::success(stdout)));
        self
    }

    pub fn then_fail(self, code: i32, stderr: &str) -> Self {
        self.results.lock().push_back(Err(BuildError::CommandFailed {
            code,
            stderr: stderr.to_string(),
        }));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<ShellResult> {
        self.commands.lock().push(command.to_string());
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ShellResult::success("")))
    }
}
