//! Pipeline steps
//!
//! Each step takes a [`StepContext`] carrying everything it may touch: the
//! variable sources, the command runner, the event sink and the settings.

mod build_docker_image;
mod validate_pipeline_syntax;

pub use build_docker_image::{BuildOptions, BuildOutcome, build_docker_image};
pub use validate_pipeline_syntax::{INFO_ENV_VARS, validate_pipeline_syntax};

use crate::env::{EnvChain, MapSource};
use crate::events::{EventSink, TracingSink};
use crate::executor::{CommandRunner, ShellCommand, ShellConfig};
use crate::infrastructure::Settings;
use std::fmt;
use std::sync::Arc;

/// Everything a step needs from its surroundings
pub struct StepContext {
    /// Variable sources, highest priority first
    pub env: EnvChain,
    /// Runs shell lines
    pub runner: Arc<dyn CommandRunner>,
    /// Receives validation findings and attempt events
    pub sink: Arc<dyn EventSink>,
    /// Tool settings
    pub settings: Settings,
    /// Identifier attached to every log line of this invocation
    pub run_id: String,
}

impl StepContext {
    /// Context backed by a real shell, the process environment and `tracing`.
    ///
    /// `env` is the stage environment and `params` the build parameters;
    /// both take priority over the process environment.
    #[must_use]
    pub fn new(settings: Settings, env: MapSource, params: MapSource) -> Self {
        let shell = ShellConfig {
            cwd: settings.workspace_dir(),
            shell: settings.shell.clone(),
            streaming: settings.streaming,
            ..ShellConfig::default()
        };
        let reader: Arc<dyn CommandRunner> = Arc::new(ShellCommand::new(shell.quiet()));
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellCommand::new(shell));

        Self {
            env: EnvChain::pipeline(env, params, reader),
            runner,
            sink: Arc::new(TracingSink),
            settings,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Replaces the command runner
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replaces the event sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the variable sources
    #[must_use]
    pub fn with_env(mut self, env: EnvChain) -> Self {
        self.env = env;
        self
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("env", &self.env)
            .field("settings", &self.settings)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
