//! Error recovery
//!
//! Bounded retries with linear backoff and an optional fallback action,
//! multi-source variable lookup, and best-effort diagnostics for when a
//! build step gives up.

mod classifier;

pub use classifier::{DEBUG_COMMANDS, Diagnosis, ErrorCategory, analyze_and_suggest};

use crate::env::EnvChain;
use crate::error::{BuildError, Result};
use crate::events::{Event, EventSink};
use crate::executor::CommandRunner;
use std::time::Duration;

/// Attempt budget used when none is configured
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Commands run by [`ErrorRecovery::run_diagnostics`]
pub const DIAGNOSTIC_COMMANDS: &[&str] = &["docker version", "docker buildx ls", "docker info"];

/// Value produced by [`ErrorRecovery::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered<T> {
    /// Result of the successful action
    pub value: T,
    /// Primary attempts made
    pub attempts: usize,
    /// Whether the value came from the fallback
    pub used_fallback: bool,
}

/// Retry wrapper and related helpers
pub struct ErrorRecovery<'a> {
    sink: &'a dyn EventSink,
    backoff_unit: Duration,
    sleep: Box<dyn Fn(Duration) + 'a>,
}

impl<'a> ErrorRecovery<'a> {
    /// Creates a wrapper reporting to `sink`, with one-second backoff units
    #[must_use]
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self {
            sink,
            backoff_unit: Duration::from_secs(1),
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Sets the backoff unit
    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Replaces how the wrapper waits between attempts
    #[must_use]
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Delay after the failed attempt `attempt` (1-based): `attempt * 2` units
    #[must_use]
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt.saturating_mul(2)).unwrap_or(u32::MAX);
        self.backoff_unit.saturating_mul(factor)
    }

    /// Runs `primary` up to `max_attempts` times, then `fallback` once.
    ///
    /// Errors that retrying cannot fix ([`BuildError::is_retryable`] is false)
    /// are returned immediately, without further attempts or fallback.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Execution`] with the last primary error when no
    /// fallback is given, or with both errors when the fallback fails too.
    pub fn execute<T>(
        &self,
        operation: &str,
        mut primary: impl FnMut() -> Result<T>,
        fallback: Option<&mut dyn FnMut() -> Result<T>>,
        max_attempts: usize,
    ) -> Result<Recovered<T>> {
        let max_attempts = max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.sink.emit(Event::AttemptStarted {
                operation: operation.to_string(),
                attempt,
                max_attempts,
            });

            match primary() {
                Ok(value) => {
                    self.sink.emit(Event::AttemptSucceeded {
                        operation: operation.to_string(),
                        attempt,
                    });
                    return Ok(Recovered {
                        value,
                        attempts: attempt,
                        used_fallback: false,
                    });
                }
                Err(e) if !e.is_retryable() => {
                    self.sink.emit(Event::AttemptFailed {
                        operation: operation.to_string(),
                        attempt,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
                Err(e) => {
                    last_error = e.to_string();
                    self.sink.emit(Event::AttemptFailed {
                        operation: operation.to_string(),
                        attempt,
                        error: last_error.clone(),
                    });
                    if attempt < max_attempts {
                        let delay = self.backoff_for(attempt);
                        tracing::warn!(
                            operation,
                            attempt,
                            total = max_attempts,
                            delay_ms = delay.as_millis(),
                            "Attempt failed, retrying"
                        );
                        (self.sleep)(delay);
                    }
                }
            }
        }

        let Some(fallback) = fallback else {
            return Err(BuildError::Execution {
                operation: operation.to_string(),
                attempts: max_attempts,
                message: last_error,
                suggestions: Vec::new(),
                context: String::new(),
            });
        };

        self.sink.emit(Event::FallbackStarted {
            operation: operation.to_string(),
        });
        match fallback() {
            Ok(value) => {
                self.sink.emit(Event::FallbackSucceeded {
                    operation: operation.to_string(),
                });
                Ok(Recovered {
                    value,
                    attempts: max_attempts,
                    used_fallback: true,
                })
            }
            Err(e) => {
                self.sink.emit(Event::FallbackFailed {
                    operation: operation.to_string(),
                    error: e.to_string(),
                });
                Err(BuildError::Execution {
                    operation: operation.to_string(),
                    attempts: max_attempts,
                    message: format!("primary error: {last_error}; fallback error: {e}"),
                    suggestions: Vec::new(),
                    context: String::new(),
                })
            }
        }
    }

    /// Looks `name` up through `env`, then `default`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingVariable`] when nothing was found, there
    /// is no default and the variable is `required`.
    pub fn safe_get_env_var(
        &self,
        env: &EnvChain,
        name: &str,
        default: Option<&str>,
        required: bool,
    ) -> Result<Option<String>> {
        if let Some((value, source)) = env.lookup_with_source(name) {
            tracing::debug!(variable = name, source, "Variable resolved");
            return Ok(Some(value));
        }
        if let Some(default) = default {
            tracing::debug!(variable = name, default, "Variable not set, using default");
            return Ok(Some(default.to_string()));
        }
        if required {
            self.sink.emit(Event::ValidationError {
                message: format!("Required variable {name} is not set"),
            });
            return Err(BuildError::MissingVariable {
                name: name.to_string(),
                hint: format!("checked {}", env.labels().join(", ")),
            });
        }
        Ok(None)
    }

    /// Classifies `error` and reports the suggestions
    #[must_use]
    pub fn analyze_and_suggest(&self, error: &str, context: &str) -> Diagnosis {
        let diagnosis = analyze_and_suggest(error, context);
        tracing::debug!(categories = ?diagnosis.categories, context, "Error analyzed");
        for suggestion in &diagnosis.suggestions {
            self.sink.emit(Event::Suggestion {
                message: suggestion.clone(),
            });
        }
        diagnosis
    }

    /// Runs [`DIAGNOSTIC_COMMANDS`] and reports their output; failures are ignored
    pub fn run_diagnostics(&self, runner: &dyn CommandRunner) {
        for command in DIAGNOSTIC_COMMANDS {
            let message = match runner.run(command) {
                Ok(result) => format!("$ {command}\n{}", result.stdout.trim_end()),
                Err(e) => format!("$ {command} (failed: {e})"),
            };
            self.sink.emit(Event::Diagnostic { message });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapSource;
    use crate::events::MemorySink;
    use crate::executor::testing::ScriptedRunner;
    use std::cell::RefCell;

    fn failing(n: usize) -> BuildError {
        BuildError::CommandFailed {
            code: 1,
            stderr: format!("failure {n}"),
        }
    }

    fn recovery(sink: &MemorySink) -> ErrorRecovery<'_> {
        ErrorRecovery::new(sink).with_backoff_unit(Duration::ZERO)
    }

    #[test]
    fn test_fails_twice_then_succeeds() {
        let sink = MemorySink::new();
        let mut calls = 0;
        let result = recovery(&sink)
            .execute(
                "build",
                || {
                    calls += 1;
                    if calls < 3 { Err(failing(calls)) } else { Ok("image") }
                },
                None,
                3,
            )
            .unwrap();

        assert_eq!(result.value, "image");
        assert_eq!(result.attempts, 3);
        assert!(!result.used_fallback);
        assert_eq!(sink.count(Event::is_failure), 2);
        assert_eq!(sink.count(Event::is_success), 1);
    }

    #[test]
    fn test_fallback_value_after_exhaustion() {
        let sink = MemorySink::new();
        let mut fallback = || -> Result<&str> { Ok("fallback") };
        let result = recovery(&sink)
            .execute("build", || Err(failing(0)), Some(&mut fallback), 3)
            .unwrap();

        assert_eq!(result.value, "fallback");
        assert!(result.used_fallback);
        assert_eq!(sink.count(|e| matches!(e, Event::AttemptFailed { .. })), 3);
        assert_eq!(sink.count(|e| matches!(e, Event::FallbackSucceeded { .. })), 1);
    }

    #[test]
    fn test_fallback_failure_concatenates_errors() {
        let sink = MemorySink::new();
        let mut calls = 0;
        let mut fallback = || -> Result<()> { Err(failing(99)) };
        let err = recovery(&sink)
            .execute(
                "build",
                || {
                    calls += 1;
                    Err(failing(calls))
                },
                Some(&mut fallback),
                2,
            )
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("failure 2"), "{message}");
        assert!(message.contains("failure 99"), "{message}");
        assert!(!message.contains("failure 1:"), "{message}");
    }

    #[test]
    fn test_no_fallback_returns_last_error() {
        let sink = MemorySink::new();
        let mut calls = 0;
        let err = recovery(&sink)
            .execute::<()>(
                "push",
                || {
                    calls += 1;
                    Err(failing(calls))
                },
                None,
                3,
            )
            .unwrap_err();

        match err {
            BuildError::Execution {
                operation,
                attempts,
                message,
                ..
            } => {
                assert_eq!(operation, "push");
                assert_eq!(attempts, 3);
                assert!(message.contains("failure 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_configuration_errors_are_not_retried() {
        let sink = MemorySink::new();
        let mut calls = 0;
        let mut fallback = || -> Result<()> { Ok(()) };
        let err = recovery(&sink)
            .execute(
                "build",
                || {
                    calls += 1;
                    Err(BuildError::Precondition {
                        path: "./Dockerfile".into(),
                    })
                },
                Some(&mut fallback),
                3,
            )
            .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, BuildError::Precondition { .. }));
        assert_eq!(sink.count(|e| matches!(e, Event::FallbackStarted { .. })), 0);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let sink = MemorySink::new();
        let result = recovery(&sink).execute("op", || Ok(1), None, 0).unwrap();
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_linear_backoff() {
        let sink = MemorySink::new();
        let recovery = ErrorRecovery::new(&sink).with_backoff_unit(Duration::from_millis(10));
        assert_eq!(recovery.backoff_for(1), Duration::from_millis(20));
        assert_eq!(recovery.backoff_for(2), Duration::from_millis(40));
        assert_eq!(recovery.backoff_for(3), Duration::from_millis(60));
    }

    #[test]
    fn test_execute_sleeps_between_attempts_only() {
        let slept = RefCell::new(Vec::new());
        let sink = MemorySink::new();
        let unit = Duration::from_millis(10);
        let recovery = ErrorRecovery::new(&sink)
            .with_backoff_unit(unit)
            .with_sleeper(|delay| slept.borrow_mut().push(delay));

        let mut fallback = || -> Result<()> { Ok(()) };
        recovery
            .execute("build", || Err(failing(0)), Some(&mut fallback), 3)
            .unwrap();

        assert_eq!(*slept.borrow(), vec![unit * 2, unit * 4]);
    }

    #[test]
    fn test_execute_does_not_sleep_after_success() {
        let slept = RefCell::new(Vec::new());
        let sink = MemorySink::new();
        let recovery = ErrorRecovery::new(&sink)
            .with_backoff_unit(Duration::from_millis(10))
            .with_sleeper(|delay| slept.borrow_mut().push(delay));

        let mut calls = 0;
        recovery
            .execute(
                "build",
                || {
                    calls += 1;
                    if calls < 2 { Err(failing(calls)) } else { Ok(()) }
                },
                None,
                3,
            )
            .unwrap();

        assert_eq!(*slept.borrow(), vec![Duration::from_millis(20)]);
    }

    #[test]
    fn test_safe_get_env_var_sources_and_defaults() {
        let sink = MemorySink::new();
        let chain = EnvChain::new()
            .with_source(MapSource::new("env").with("A", "from-env"))
            .with_source(MapSource::new("params").with("A", "from-params").with("B", "b"));
        let recovery = recovery(&sink);

        assert_eq!(
            recovery.safe_get_env_var(&chain, "A", None, true).unwrap().as_deref(),
            Some("from-env")
        );
        assert_eq!(
            recovery.safe_get_env_var(&chain, "B", None, true).unwrap().as_deref(),
            Some("b")
        );
        assert_eq!(
            recovery.safe_get_env_var(&chain, "C", Some("dflt"), true).unwrap().as_deref(),
            Some("dflt")
        );
        assert_eq!(recovery.safe_get_env_var(&chain, "C", None, false).unwrap(), None);
    }

    #[test]
    fn test_safe_get_env_var_required_missing() {
        let sink = MemorySink::new();
        let chain = EnvChain::new().with_source(MapSource::new("env"));
        let err = recovery(&sink)
            .safe_get_env_var(&chain, "REGISTRY_HOST", None, true)
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingVariable { ref name, .. } if name == "REGISTRY_HOST"));
        assert!(err.to_string().contains("env"));
    }

    #[test]
    fn test_run_diagnostics_ignores_failures() {
        let sink = MemorySink::new();
        let runner = ScriptedRunner::new()
            .then_ok("Docker 27.0")
            .then_fail(1, "no buildx")
            .then_ok("info");

        recovery(&sink).run_diagnostics(&runner);

        assert_eq!(runner.commands(), DIAGNOSTIC_COMMANDS);
        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(events[1].to_string().contains("failed"));
    }

    #[test]
    fn test_analyze_reports_suggestions() {
        let sink = MemorySink::new();
        let diagnosis = recovery(&sink).analyze_and_suggest("network timeout", "push");
        assert_eq!(diagnosis.categories, vec![ErrorCategory::Network]);
        assert_eq!(
            sink.count(|e| matches!(e, Event::Suggestion { .. })),
            diagnosis.suggestions.len()
        );
    }
}
