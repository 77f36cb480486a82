//! Build configuration validation
//!
//! The validator looks for the mistakes pipeline authors actually make:
//! Groovy-style `${...}` templates that were never interpolated, variable
//! names used as literal values, missing registry settings. It never stops
//! at the first problem; every check runs and the findings are collected
//! into a [`ValidationReport`].
//!
//! Only errors are blocking. Warnings and suggestions are advisory.

mod report;

pub use report::{OutputFormat, ValidationReport};

use crate::build::{
    BuildConfig, ENV_BUILD_NUMBER, ENV_BUILDER, ENV_JOB_NAME, ENV_REGISTRY_HOST, builder_for,
};
use crate::env::EnvSource;
use crate::events::EventSink;
use once_cell::sync::Lazy;
use regex::Regex;

/// Environment variables without which the build cannot resolve
pub const REQUIRED_ENV_VARS: &[&str] = &[ENV_REGISTRY_HOST];
/// Environment variables that feed optional fields
pub const OPTIONAL_ENV_VARS: &[&str] = &[ENV_JOB_NAME, ENV_BUILD_NUMBER, ENV_BUILDER];
/// Config keys that must be present
pub const REQUIRED_FIELDS: &[&str] = &["name"];
/// Config keys that should be present
pub const RECOMMENDED_FIELDS: &[&str] = &["host", "project", "tag"];

/// Variable names that show up as literal values when interpolation was forgotten
const BARE_VARIABLES: &[&str] = &[ENV_BUILD_NUMBER, ENV_JOB_NAME];

static TEMPLATE_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\s*(?:env\.|params\.)?([A-Za-z_][A-Za-z0-9_]*)\s*\}")
        .expect("template variable pattern is valid")
});

/// Config key fed by an environment variable, if any
fn field_for_env(var: &str) -> Option<&'static str> {
    match var {
        ENV_REGISTRY_HOST => Some("host"),
        ENV_JOB_NAME => Some("project"),
        ENV_BUILD_NUMBER => Some("tag"),
        _ => None,
    }
}

/// Validates [`BuildConfig`]s against an environment
pub struct ConfigValidator<'a> {
    env: &'a dyn EnvSource,
    sink: &'a dyn EventSink,
}

impl<'a> ConfigValidator<'a> {
    /// Creates a validator reading variables from `env` and reporting to `sink`
    #[must_use]
    pub fn new(env: &'a dyn EnvSource, sink: &'a dyn EventSink) -> Self {
        Self { env, sink }
    }

    /// Runs every check and emits the resulting report
    #[must_use]
    pub fn validate(&self, config: &BuildConfig) -> ValidationReport {
        let mut report = ValidationReport::default();

        Self::check_syntax(config, &mut report);
        self.check_environment(config, &mut report);
        Self::check_completeness(config, &mut report);
        Self::check_optimizations(config, &mut report);

        tracing::info!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            suggestions = report.suggestions.len(),
            "Configuration validated"
        );
        report.emit(self.sink);
        report
    }

    fn check_syntax(config: &BuildConfig, report: &mut ValidationReport) {
        for (field, value) in config.string_fields() {
            if value.contains("${") && !value.starts_with("./") && !value.starts_with('/') {
                report.error(format!(
                    "Field '{field}' contains an uninterpolated template: '{value}'"
                ));
                let fix = match TEMPLATE_VAR.captures(value).map(|c| c[1].to_string()) {
                    Some(var) => format!(
                        "Resolve '{field}' before passing it in: use env.{var} or params.{var} \
                         (or a double-quoted Groovy string) instead of the literal '${{{var}}}'"
                    ),
                    None => format!(
                        "Resolve '{field}' before passing it in: use env.VAR or params.VAR \
                         instead of a literal '${{...}}'"
                    ),
                };
                report.suggest(fix);
            }

            if BARE_VARIABLES.contains(&value) {
                report.error(format!(
                    "Field '{field}' is the literal text '{value}', not its value"
                ));
                report.suggest(format!("Use env.{value} for '{field}' instead of the bare name"));
            }
        }
    }

    fn check_environment(&self, config: &BuildConfig, report: &mut ValidationReport) {
        let configured = |var: &str| field_for_env(var).is_some_and(|field| config.has(field));
        let present = |var: &str| self.env.lookup(var).is_some_and(|v| !v.is_empty());

        for &var in REQUIRED_ENV_VARS {
            if !present(var) && !configured(var) {
                let field = field_for_env(var).unwrap_or("host");
                report.warn(format!(
                    "Required environment variable {var} is not set and '{field}' is not \
                     configured; the build cannot resolve the registry. Export {var} or set \
                     '{field}' in the build config"
                ));
            }
        }

        if let Some(name) = config.name.as_deref().filter(|n| n.contains('/'))
            && !config.has("project")
            && !present(ENV_JOB_NAME)
        {
            report.warn(format!(
                "Image name '{name}' contains '/' but no project is set; the image \
                 reference will read its first segment as the project. Set 'project' or \
                 {ENV_JOB_NAME}"
            ));
        }

        for &var in OPTIONAL_ENV_VARS {
            if !present(var) && !configured(var) {
                report.warn(format!(
                    "Optional environment variable {var} is not set; defaults will be used"
                ));
            }
        }
    }

    fn check_completeness(config: &BuildConfig, report: &mut ValidationReport) {
        for field in REQUIRED_FIELDS {
            if !config.has(field) {
                report.error(format!("Missing required parameter '{field}'"));
            }
        }

        for field in RECOMMENDED_FIELDS {
            if !config.has(field) {
                report.warn(format!(
                    "Recommended parameter '{field}' is not set; it will be resolved from the \
                     environment or defaults"
                ));
            }
        }
    }

    fn check_optimizations(config: &BuildConfig, report: &mut ValidationReport) {
        if config.enable_cache.is_none() {
            report.suggest("Set enableCache explicitly (defaults to true) to make cache use obvious");
        }
        if !config.has("platform") {
            report.suggest("Set platform explicitly (defaults to linux/amd64)");
        }
        if !config.has("buildArgs") {
            report.suggest(
                "Consider passing buildArgs such as VERSION or GIT_COMMIT to label the image",
            );
        }
        if let Some(platform) = config.platform.as_deref().filter(|p| p.contains(',')) {
            report.warn(format!(
                "Platform '{platform}' targets multiple architectures; make sure the buildx \
                 builder '{}' exists on this agent (docker buildx ls)",
                builder_for(platform)
            ));
        }
    }
}
