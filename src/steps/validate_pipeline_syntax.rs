//! `ValidatePipelineSyntax` step
//!
//! Prints what the agent knows about the job, then validates the build
//! configuration without running anything.

use super::StepContext;
use crate::build::BuildConfig;
use crate::env::EnvSource;
use crate::error::Result;
use crate::events::Event;
use crate::validation::{ConfigValidator, ValidationReport};

/// Variables reported for context only
pub const INFO_ENV_VARS: &[&str] = &[
    "JENKINS_VERSION",
    "NODE_LABELS",
    "WORKSPACE",
    "GIT_COMMIT",
    "BUILD_URL",
    "JENKINS_URL",
];

/// Validates `config` and returns the report.
///
/// A missing Dockerfile is reported as a warning here; the build step
/// treats it as fatal.
///
/// # Errors
///
/// With `strict`, returns [`crate::BuildError::Configuration`] when the
/// report contains errors.
pub fn validate_pipeline_syntax(
    ctx: &StepContext,
    config: &BuildConfig,
    strict: bool,
) -> Result<ValidationReport> {
    let span = tracing::info_span!("validate_pipeline_syntax", run_id = %ctx.run_id);
    let _guard = span.enter();

    for name in INFO_ENV_VARS {
        let value = ctx.env.lookup(name);
        ctx.sink.emit(Event::Diagnostic {
            message: format!("{name}={}", value.as_deref().unwrap_or("(not set)")),
        });
    }

    let mut report = ConfigValidator::new(&ctx.env, &*ctx.sink).validate(config);

    let path = config
        .path
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(crate::build::DEFAULT_DOCKERFILE);
    if !path.contains("${") && !ctx.settings.workspace_dir().join(path).is_file() {
        let message = format!("Dockerfile '{path}' does not exist in the workspace");
        ctx.sink.emit(Event::ValidationWarning {
            message: message.clone(),
        });
        report.warnings.push(message);
    }

    if strict {
        report.into_result()
    } else {
        Ok(report)
    }
}
