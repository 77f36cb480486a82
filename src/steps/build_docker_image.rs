//! `BuildDockerImage` step
//!
//! Validate, resolve, check the Dockerfile, render, then run the build
//! inside the retry wrapper. When the registry cache is on, the fallback
//! reruns the same build without cache flags, since a corrupt or
//! unreachable cache ref is a common cause of repeated failures.

use super::StepContext;
use crate::build::{BuildCommand, BuildConfig, ENV_REGISTRY_HOST, ResolvedBuildConfig};
use crate::error::{BuildError, Result};
use crate::executor::ShellResult;
use crate::recovery::ErrorRecovery;
use crate::validation::ConfigValidator;
use serde::Serialize;

/// Per-invocation switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Render the command without running it
    pub dry_run: bool,
    /// Overrides the configured attempt budget
    pub max_attempts: Option<usize>,
}

/// What a build step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    /// Image reference with the explicit tag
    pub image: String,
    /// Every pushed reference
    pub images: Vec<String>,
    /// Builder the command selected
    pub builder: String,
    /// Command line that ran (or would run)
    pub command: String,
    /// False for dry runs
    pub executed: bool,
    /// Primary attempts made
    pub attempts: usize,
    /// Whether the cache-less fallback produced the image
    pub used_fallback: bool,
}

impl BuildOutcome {
    fn new(resolved: &ResolvedBuildConfig, command: &BuildCommand) -> Self {
        Self {
            image: resolved.image(&resolved.tag),
            images: vec![
                resolved.image(&resolved.tag),
                resolved.image(crate::build::DEFAULT_TAG),
            ],
            builder: resolved.builder_name().to_string(),
            command: command.to_shell_line(),
            executed: false,
            attempts: 0,
            used_fallback: false,
        }
    }
}

/// Builds and pushes an image described by `config`
///
/// # Errors
///
/// - [`BuildError::Configuration`] / [`BuildError::MissingVariable`] when the
///   config is invalid; nothing is run.
/// - [`BuildError::Precondition`] when the Dockerfile does not exist.
/// - [`BuildError::Execution`] when every attempt (and the fallback) failed,
///   with suggestions from the error classifier attached.
pub fn build_docker_image(
    ctx: &StepContext,
    config: &BuildConfig,
    options: BuildOptions,
) -> Result<BuildOutcome> {
    let span = tracing::info_span!("build_docker_image", run_id = %ctx.run_id);
    let _guard = span.enter();

    ConfigValidator::new(&ctx.env, &*ctx.sink)
        .validate(config)
        .into_result()?;

    let recovery = ErrorRecovery::new(&*ctx.sink).with_backoff_unit(ctx.settings.backoff_unit());

    let mut config = config.clone();
    if !config.has("host") {
        config.host = recovery.safe_get_env_var(&ctx.env, ENV_REGISTRY_HOST, None, true)?;
    }
    let resolved = config.resolve(&ctx.env)?;

    let dockerfile = ctx.settings.workspace_dir().join(&resolved.path);
    if !dockerfile.is_file() {
        tracing::error!(path = %dockerfile.display(), "Dockerfile not found");
        return Err(BuildError::Precondition { path: dockerfile });
    }

    let command = BuildCommand::render(&resolved);
    let mut outcome = BuildOutcome::new(&resolved, &command);
    tracing::info!(
        image = %outcome.image,
        builder = %outcome.builder,
        cache = resolved.enable_cache,
        "Rendered build command"
    );

    if options.dry_run {
        tracing::info!(command = %outcome.command, "Dry run, not executing");
        return Ok(outcome);
    }

    let max_attempts = options.max_attempts.unwrap_or(ctx.settings.max_attempts);

    let fallback_line = (command.uses_cache() && ctx.settings.fallback_without_cache).then(|| {
        BuildCommand::render(&ResolvedBuildConfig {
            enable_cache: false,
            ..resolved.clone()
        })
        .to_shell_line()
    });
    let mut fallback = fallback_line.as_deref().map(|line| {
        move || -> Result<ShellResult> {
            tracing::warn!("Retrying build without registry cache");
            ctx.runner.run(line)
        }
    });

    let line = outcome.command.clone();
    let result = recovery.execute(
        "docker build",
        || ctx.runner.run(&line),
        fallback
            .as_mut()
            .map(|f| f as &mut dyn FnMut() -> Result<ShellResult>),
        max_attempts,
    );

    match result {
        Ok(recovered) => {
            outcome.executed = true;
            outcome.attempts = recovered.attempts;
            outcome.used_fallback = recovered.used_fallback;
            if recovered.used_fallback {
                outcome.command = fallback_line.unwrap_or(line);
            }
            tracing::info!(image = %outcome.image, attempts = outcome.attempts, "Image pushed");
            Ok(outcome)
        }
        Err(BuildError::Execution {
            operation,
            attempts,
            message,
            ..
        }) => {
            let diagnosis = recovery.analyze_and_suggest(&message, &line);
            recovery.run_diagnostics(&*ctx.runner);
            Err(BuildError::Execution {
                operation,
                attempts,
                message,
                suggestions: diagnosis.suggestions,
                context: line,
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{EnvChain, MapSource};
    use crate::events::{Event, MemorySink};
    use crate::executor::testing::ScriptedRunner;
    use crate::infrastructure::Settings;
    use crate::recovery::DIAGNOSTIC_COMMANDS;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Harness {
        ctx: StepContext,
        runner: Arc<ScriptedRunner>,
        sink: Arc<MemorySink>,
        _workspace: TempDir,
    }

    fn harness(runner: ScriptedRunner, env: MapSource, with_dockerfile: bool) -> Harness {
        let workspace = TempDir::new().unwrap();
        if with_dockerfile {
            std::fs::write(workspace.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        }
        let settings = Settings {
            workspace: Some(workspace.path().to_path_buf()),
            backoff_unit_ms: 0,
            ..Settings::default()
        };
        let runner = Arc::new(runner);
        let sink = Arc::new(MemorySink::new());
        let ctx = StepContext::new(settings, MapSource::new("env"), MapSource::new("params"))
            .with_env(EnvChain::new().with_source(env))
            .with_runner(runner.clone())
            .with_sink(sink.clone());
        Harness {
            ctx,
            runner,
            sink,
            _workspace: workspace,
        }
    }

    fn scenario() -> BuildConfig {
        BuildConfig {
            host: Some("r.io".to_string()),
            project: Some("p".to_string()),
            tag: Some("7".to_string()),
            platform: Some("linux/amd64".to_string()),
            enable_cache: Some(false),
            ..BuildConfig::named("app")
        }
    }

    #[test]
    fn test_runs_rendered_command() {
        let h = harness(ScriptedRunner::new(), MapSource::new("env"), true);
        let outcome = build_docker_image(&h.ctx, &scenario(), BuildOptions::default()).unwrap();

        let expected = "docker buildx --builder default build --progress=auto \
                        --platform=linux/amd64 -t r.io/p/app:7 -t r.io/p/app:latest \
                        --push -f ./Dockerfile .";
        assert_eq!(h.runner.commands(), vec![expected.to_string()]);
        assert!(outcome.executed);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.image, "r.io/p/app:7");
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let h = harness(ScriptedRunner::new(), MapSource::new("env"), true);
        let options = BuildOptions {
            dry_run: true,
            ..BuildOptions::default()
        };
        let outcome = build_docker_image(&h.ctx, &scenario(), options).unwrap();
        assert!(!outcome.executed);
        assert!(h.runner.commands().is_empty());
        assert!(outcome.command.starts_with("docker buildx --builder default build"));
    }

    #[test]
    fn test_validation_errors_are_fatal_before_running() {
        let h = harness(ScriptedRunner::new(), MapSource::new("env"), true);
        let config = BuildConfig {
            tag: Some("${BUILD_NUMBER}".to_string()),
            ..scenario()
        };
        let err = build_docker_image(&h.ctx, &config, BuildOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Configuration { count: 1, .. }));
        assert!(h.runner.commands().is_empty());
    }

    #[test]
    fn test_missing_dockerfile_is_precondition_error() {
        let h = harness(ScriptedRunner::new(), MapSource::new("env"), false);
        let err = build_docker_image(&h.ctx, &scenario(), BuildOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Precondition { .. }));
        assert!(h.runner.commands().is_empty());
    }

    #[test]
    fn test_env_supplies_host_and_tag() {
        let env = MapSource::new("env")
            .with("REGISTRY_HOST", "reg.local")
            .with("JOB_NAME", "team")
            .with("BUILD_NUMBER", "42");
        let h = harness(ScriptedRunner::new(), env, true);
        let config = BuildConfig {
            enable_cache: Some(false),
            ..BuildConfig::named("svc")
        };
        let outcome = build_docker_image(&h.ctx, &config, BuildOptions::default()).unwrap();
        assert_eq!(outcome.image, "reg.local/team/svc:42");
    }

    #[test]
    fn test_missing_registry_host_names_every_source() {
        let h = harness(ScriptedRunner::new(), MapSource::new("env"), true);
        let config = BuildConfig {
            host: None,
            ..scenario()
        };

        let err = build_docker_image(&h.ctx, &config, BuildOptions::default()).unwrap_err();

        match &err {
            BuildError::MissingVariable { name, hint } => {
                assert_eq!(name, "REGISTRY_HOST");
                assert!(hint.contains("env"), "{hint}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.sink.events().iter().any(|e| matches!(
            e,
            Event::ValidationError { message } if message.contains("REGISTRY_HOST")
        )));
        assert!(h.runner.commands().is_empty());
    }

    #[test]
    fn test_retries_then_succeeds() {
        let runner = ScriptedRunner::new()
            .then_fail(1, "network glitch")
            .then_ok("pushed");
        let h = harness(runner, MapSource::new("env"), true);
        let outcome = build_docker_image(&h.ctx, &scenario(), BuildOptions::default()).unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(h.sink.count(Event::is_failure), 1);
    }

    #[test]
    fn test_cache_fallback_drops_cache_flags() {
        let runner = ScriptedRunner::new()
            .then_fail(1, "cache import failed")
            .then_fail(1, "cache import failed")
            .then_fail(1, "cache import failed")
            .then_ok("pushed");
        let h = harness(runner, MapSource::new("env"), true);
        let config = BuildConfig {
            enable_cache: Some(true),
            ..scenario()
        };

        let outcome = build_docker_image(&h.ctx, &config, BuildOptions::default()).unwrap();

        let commands = h.runner.commands();
        assert_eq!(commands.len(), 4);
        assert!(commands[0].contains("--cache-to"));
        assert!(!commands[3].contains("--cache-to"));
        assert!(outcome.used_fallback);
        assert_eq!(outcome.command, commands[3]);
    }

    #[test]
    fn test_final_failure_carries_suggestions_and_context() {
        let runner = ScriptedRunner::new()
            .then_fail(1, "permission denied while trying to connect to the docker daemon")
            .then_fail(1, "permission denied while trying to connect to the docker daemon");
        let h = harness(runner, MapSource::new("env"), true);
        let options = BuildOptions {
            max_attempts: Some(2),
            ..BuildOptions::default()
        };

        let err = build_docker_image(&h.ctx, &scenario(), options).unwrap_err();

        match &err {
            BuildError::Execution {
                attempts,
                suggestions,
                context,
                ..
            } => {
                assert_eq!(*attempts, 2);
                assert!(suggestions.iter().any(|s| s.contains("docker group")));
                assert!(context.starts_with("docker buildx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // two build attempts, then best-effort diagnostics
        let commands = h.runner.commands();
        assert_eq!(commands.len(), 2 + DIAGNOSTIC_COMMANDS.len());
        assert_eq!(&commands[2..], DIAGNOSTIC_COMMANDS);
    }
}
