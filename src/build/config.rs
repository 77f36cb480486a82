//! Build configuration
//!
//! [`BuildConfig`] is what a pipeline author writes: every field is
//! optional. [`BuildConfig::resolve`] turns it into a [`ResolvedBuildConfig`]
//! by walking each field's fallback chain (explicit value, then environment
//! variable, then default).

use crate::env::EnvSource;
use crate::error::{BuildError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Default platform when none is configured
pub const DEFAULT_PLATFORM: &str = "linux/amd64";
/// Default Dockerfile location
pub const DEFAULT_DOCKERFILE: &str = "./Dockerfile";
/// Default image tag
pub const DEFAULT_TAG: &str = "latest";
/// Default buildx progress mode
pub const DEFAULT_PROGRESS: &str = "auto";
/// Platform list that selects the multi-platform builder
pub const MULTI_PLATFORM: &str = "linux/amd64,linux/arm64";

/// Environment variable holding the registry host
pub const ENV_REGISTRY_HOST: &str = "REGISTRY_HOST";
/// Environment variable holding the job (project) name
pub const ENV_JOB_NAME: &str = "JOB_NAME";
/// Environment variable holding the build number
pub const ENV_BUILD_NUMBER: &str = "BUILD_NUMBER";
/// Environment variable naming the buildx builder
pub const ENV_BUILDER: &str = "BUILDER";

/// Image build configuration as written by the pipeline author
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfig {
    /// Registry host, e.g. `registry.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Project (registry namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Image name (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Image tag; numbers are accepted and kept as text
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub tag: Option<String>,

    /// Target platform(s), comma separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Dockerfile path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Whether to use the registry build cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_cache: Option<bool>,

    /// `KEY=VALUE` build arguments, passed through in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_args: Option<Vec<String>>,

    /// buildx progress output mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    }))
}

impl BuildConfig {
    /// Creates a config with only the image name set
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Loads a config from a YAML or JSON file (chosen by extension)
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if the file cannot be read and
    /// [`BuildError::Parse`] if it is not a valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| BuildError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Overlays every field set in `other` on top of `self`
    #[must_use]
    pub fn merged(mut self, other: Self) -> Self {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.host, other.host);
        take(&mut self.project, other.project);
        take(&mut self.name, other.name);
        take(&mut self.tag, other.tag);
        take(&mut self.platform, other.platform);
        take(&mut self.path, other.path);
        take(&mut self.enable_cache, other.enable_cache);
        take(&mut self.build_args, other.build_args);
        take(&mut self.progress, other.progress);
        self
    }

    /// Every string-valued field that is set, with its config key
    #[must_use]
    pub fn string_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("host", &self.host),
            ("project", &self.project),
            ("name", &self.name),
            ("tag", &self.tag),
            ("platform", &self.platform),
            ("path", &self.path),
            ("progress", &self.progress),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }

    /// Returns true when the field behind `key` holds a non-empty value
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        match key {
            "enableCache" => self.enable_cache.is_some(),
            "buildArgs" => self.build_args.as_ref().is_some_and(|a| !a.is_empty()),
            _ => self
                .string_fields()
                .iter()
                .any(|(k, v)| *k == key && !v.is_empty()),
        }
    }

    /// Resolves every field through its fallback chain
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] when `name` is missing and
    /// [`BuildError::MissingVariable`] when no registry host can be found.
    pub fn resolve(&self, env: &dyn EnvSource) -> Result<ResolvedBuildConfig> {
        let name = self
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BuildError::Configuration {
                count: 1,
                errors: vec!["Missing required parameter 'name'".to_string()],
            })?;

        let host = safe_get_config(self.host.clone(), env, Some(ENV_REGISTRY_HOST), None)
            .ok_or_else(|| BuildError::MissingVariable {
                name: ENV_REGISTRY_HOST.to_string(),
                hint: "set 'host' in the build config or export REGISTRY_HOST".to_string(),
            })?;

        let resolved = ResolvedBuildConfig {
            host,
            project: safe_get_config(self.project.clone(), env, Some(ENV_JOB_NAME), None),
            name,
            tag: safe_get_config(
                self.tag.clone(),
                env,
                Some(ENV_BUILD_NUMBER),
                Some(DEFAULT_TAG),
            )
            .unwrap_or_else(|| DEFAULT_TAG.to_string()),
            platform: safe_get_config(self.platform.clone(), env, None, Some(DEFAULT_PLATFORM))
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            path: safe_get_config(self.path.clone(), env, None, Some(DEFAULT_DOCKERFILE))
                .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string()),
            enable_cache: self.enable_cache.unwrap_or(true),
            build_args: self.build_args.clone().unwrap_or_default(),
            progress: safe_get_config(self.progress.clone(), env, None, Some(DEFAULT_PROGRESS))
                .unwrap_or_else(|| DEFAULT_PROGRESS.to_string()),
        };

        tracing::debug!(
            host = %resolved.host,
            project = resolved.project.as_deref().unwrap_or("-"),
            name = %resolved.name,
            tag = %resolved.tag,
            platform = %resolved.platform,
            "Resolved build configuration"
        );

        Ok(resolved)
    }
}

/// Three-tier fallback: explicit value, then `env_key` in `env`, then `default`.
///
/// Empty strings count as missing at every tier.
#[must_use]
pub fn safe_get_config(
    value: Option<String>,
    env: &dyn EnvSource,
    env_key: Option<&str>,
    default: Option<&str>,
) -> Option<String> {
    value
        .filter(|v| !v.is_empty())
        .or_else(|| {
            env_key
                .and_then(|key| env.lookup(key))
                .filter(|v| !v.is_empty())
        })
        .or_else(|| default.map(str::to_string))
}

/// A configuration with every fallback applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBuildConfig {
    /// Registry host
    pub host: String,
    /// Project (registry namespace); omitted from the repository when unset
    pub project: Option<String>,
    /// Image name
    pub name: String,
    /// Image tag
    pub tag: String,
    /// Target platform(s)
    pub platform: String,
    /// Dockerfile path
    pub path: String,
    /// Registry build cache on/off
    pub enable_cache: bool,
    /// Build arguments in order
    pub build_args: Vec<String>,
    /// buildx progress mode
    pub progress: String,
}

impl ResolvedBuildConfig {
    /// Name of the buildx builder to use for this platform
    #[must_use]
    pub fn builder_name(&self) -> &'static str {
        builder_for(&self.platform)
    }

    /// `<host>/<project>/<name>`, or `<host>/<name>` without a project
    #[must_use]
    pub fn repository(&self) -> String {
        match &self.project {
            Some(project) => format!("{}/{}/{}", self.host, project, self.name),
            None => format!("{}/{}", self.host, self.name),
        }
    }

    /// Image reference for `tag`
    #[must_use]
    pub fn image(&self, tag: &str) -> String {
        format!("{}:{tag}", self.repository())
    }

    /// Registry reference used for the build cache
    #[must_use]
    pub fn cache_ref(&self) -> String {
        self.image("buildcache")
    }
}

/// Builder identity for a platform string
#[must_use]
pub fn builder_for(platform: &str) -> &'static str {
    if platform == MULTI_PLATFORM {
        "multi-platform"
    } else {
        "default"
    }
}
