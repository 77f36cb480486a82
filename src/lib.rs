//! # Buildline - Docker buildx steps for CI pipelines
//!
//! Buildline provides the pipeline steps a CI job needs to build and push
//! container images with `docker buildx`, with the guard rails that keep a
//! shared build step from failing in confusing ways.
//!
//! ## Steps
//!
//! - [`build_docker_image`]: validate a [`BuildConfig`], resolve every field
//!   through its fallback chain (config, environment, default), render the
//!   `docker buildx build` command and run it with bounded retries.
//! - [`validate_pipeline_syntax`]: report errors, warnings and suggestions
//!   for a configuration without running anything.
//!
//! ## Quick Start
//!
//! ```rust
//! use buildline::prelude::*;
//!
//! let env = MapSource::new("env").with("REGISTRY_HOST", "registry.example.com");
//! let config = BuildConfig {
//!     project: Some("platform".to_string()),
//!     tag: Some("42".to_string()),
//!     ..BuildConfig::named("api")
//! };
//!
//! let resolved = config.resolve(&env)?;
//! let command = BuildCommand::render(&resolved);
//! assert!(command.to_shell_line().contains("-t registry.example.com/platform/api:42"));
//! # Ok::<(), buildline::BuildError>(())
//! ```
//!
//! ## License
//!
//! Licensed under either of MIT or Apache-2.0, at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod build;
pub mod env;
pub mod error;
pub mod events;
pub mod executor;
pub mod infrastructure;
pub mod recovery;
pub mod steps;
pub mod validation;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use build::{BuildCommand, BuildConfig, ParsedBuildCommand, ResolvedBuildConfig};
pub use env::{EnvChain, EnvSource, MapSource, ProcessEnv, ShellEnv};
pub use error::{BuildError, Result};
pub use events::{Event, EventSink, MemorySink, TracingSink};
pub use executor::{CommandRunner, ShellCommand, ShellConfig, ShellResult};
pub use infrastructure::{Settings, init_logging};
pub use recovery::{Diagnosis, ErrorCategory, ErrorRecovery, analyze_and_suggest};
pub use steps::{
    BuildOptions, BuildOutcome, StepContext, build_docker_image, validate_pipeline_syntax,
};
pub use validation::{ConfigValidator, OutputFormat, ValidationReport};

/// Version of the buildline crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
