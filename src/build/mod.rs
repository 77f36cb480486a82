//! Image build configuration and command rendering

mod command;
mod config;

pub use command::{BuildCommand, ParseCommandError, ParsedBuildCommand};
pub use config::{
    BuildConfig, DEFAULT_DOCKERFILE, DEFAULT_PLATFORM, DEFAULT_PROGRESS, DEFAULT_TAG,
    ENV_BUILD_NUMBER, ENV_BUILDER, ENV_JOB_NAME, ENV_REGISTRY_HOST, MULTI_PLATFORM,
    ResolvedBuildConfig, builder_for, safe_get_config,
};
