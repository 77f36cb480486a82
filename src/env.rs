//! Environment variable sources
//!
//! A pipeline can see a variable in several places: the stage environment,
//! the build parameters, the agent process, or only inside a shell. Each of
//! those is an [`EnvSource`]; an [`EnvChain`] tries them in order and the
//! first non-empty value wins.

use crate::executor::CommandRunner;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Something that can answer "what is the value of `name`?"
pub trait EnvSource: Send + Sync {
    /// Short label used in logs
    fn label(&self) -> &str;

    /// Looks up `name`; `None` when this source does not know it
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Fixed key/value map, used for the pipeline environment and parameters
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    label: String,
    vars: HashMap<String, String>,
}

impl MapSource {
    /// Creates an empty source with the given label
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vars: HashMap::new(),
        }
    }

    /// Sets a variable
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Sets a variable in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Number of variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true when no variables are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for MapSource {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl EnvSource for MapSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Environment of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn label(&self) -> &str {
        "process"
    }

    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Reads a variable by asking a shell (`printenv NAME`)
pub struct ShellEnv {
    runner: Arc<dyn CommandRunner>,
}

impl ShellEnv {
    /// Creates a source backed by `runner`
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl fmt::Debug for ShellEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellEnv").finish_non_exhaustive()
    }
}

impl EnvSource for ShellEnv {
    fn label(&self) -> &str {
        "shell"
    }

    fn lookup(&self, name: &str) -> Option<String> {
        // Only plain identifiers reach the shell
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        match self.runner.run(&format!("printenv {name}")) {
            Ok(result) => Some(result.stdout.trim_end_matches(['\n', '\r']).to_string()),
            Err(e) => {
                tracing::trace!(variable = name, error = %e, "Shell lookup failed");
                None
            }
        }
    }
}

/// Ordered list of sources; first non-empty value wins
#[derive(Default)]
pub struct EnvChain {
    sources: Vec<Box<dyn EnvSource>>,
}

impl EnvChain {
    /// Creates an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source at the lowest priority
    #[must_use]
    pub fn with_source(mut self, source: impl EnvSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// The standard pipeline order: stage environment, parameters, process, shell
    #[must_use]
    pub fn pipeline(env: MapSource, params: MapSource, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new()
            .with_source(env)
            .with_source(params)
            .with_source(ProcessEnv)
            .with_source(ShellEnv::new(runner))
    }

    /// Looks up `name` and reports which source answered
    #[must_use]
    pub fn lookup_with_source(&self, name: &str) -> Option<(String, &str)> {
        self.sources.iter().find_map(|source| {
            source
                .lookup(name)
                .filter(|value| !value.is_empty())
                .map(|value| (value, source.label()))
        })
    }

    /// Labels of the configured sources, highest priority first
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.label()).collect()
    }
}

impl fmt::Debug for EnvChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvChain")
            .field("sources", &self.labels())
            .finish()
    }
}

impl EnvSource for EnvChain {
    fn label(&self) -> &str {
        "chain"
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.lookup_with_source(name).map(|(value, source)| {
            tracing::trace!(variable = name, source, "Resolved variable");
            value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::ScriptedRunner;

    #[test]
    fn test_map_source_lookup() {
        let source = MapSource::new("env").with("JOB_NAME", "web");
        assert_eq!(source.lookup("JOB_NAME").as_deref(), Some("web"));
        assert!(source.lookup("BUILD_NUMBER").is_none());
    }

    #[test]
    fn test_chain_first_source_wins() {
        let chain = EnvChain::new()
            .with_source(MapSource::new("env").with("TAG", "1"))
            .with_source(MapSource::new("params").with("TAG", "2"));
        assert_eq!(chain.lookup_with_source("TAG"), Some(("1".to_string(), "env")));
    }

    #[test]
    fn test_chain_skips_empty_values() {
        let chain = EnvChain::new()
            .with_source(MapSource::new("env").with("TAG", ""))
            .with_source(MapSource::new("params").with("TAG", "2"));
        assert_eq!(chain.lookup("TAG").as_deref(), Some("2"));
    }

    #[test]
    fn test_chain_falls_through_to_shell() {
        let runner = Arc::new(ScriptedRunner::new().then_ok("from-shell\n"));
        let chain = EnvChain::new()
            .with_source(MapSource::new("env"))
            .with_source(ShellEnv::new(runner.clone()));

        assert_eq!(chain.lookup("BUILDLINE_ONLY_IN_SHELL").as_deref(), Some("from-shell"));
        assert_eq!(runner.commands(), vec!["printenv BUILDLINE_ONLY_IN_SHELL"]);
    }

    #[test]
    fn test_shell_env_failure_is_none() {
        let runner = Arc::new(ScriptedRunner::new().then_fail(1, ""));
        let source = ShellEnv::new(runner);
        assert!(source.lookup("MISSING").is_none());
    }

    #[test]
    fn test_shell_env_refuses_odd_names() {
        let runner = Arc::new(ScriptedRunner::new());
        let source = ShellEnv::new(runner.clone());
        assert!(source.lookup("A; rm -rf /").is_none());
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_pipeline_chain_order() {
        let chain = EnvChain::pipeline(
            MapSource::new("env"),
            MapSource::new("params"),
            Arc::new(ScriptedRunner::new()),
        );
        assert_eq!(chain.labels(), vec!["env", "params", "process", "shell"]);
    }
}
