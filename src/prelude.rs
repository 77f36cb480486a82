//! Prelude module for common imports

pub use crate::build::{BuildCommand, BuildConfig, ParsedBuildCommand, ResolvedBuildConfig};
pub use crate::env::{EnvChain, EnvSource, MapSource};
pub use crate::error::BuildError;
pub use crate::events::{Event, EventSink, MemorySink, TracingSink};
pub use crate::executor::{CommandRunner, ShellCommand, ShellConfig};
pub use crate::infrastructure::Settings;
pub use crate::recovery::{ErrorRecovery, analyze_and_suggest};
pub use crate::steps::{
    BuildOptions, BuildOutcome, StepContext, build_docker_image, validate_pipeline_syntax,
};
pub use crate::validation::{ConfigValidator, ValidationReport};
