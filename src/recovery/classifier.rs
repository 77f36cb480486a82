//! Error classification
//!
//! Maps an error message to the likely causes a pipeline author should look
//! at. Purely advisory: nothing here changes control flow.

use serde::Serialize;
use std::fmt;

/// Commands worth running by hand when a build step fails
pub const DEBUG_COMMANDS: &[&str] = &[
    "env | sort",
    "docker version",
    "docker buildx ls",
    "docker buildx inspect --bootstrap",
    "docker info",
    "ls -la",
];

/// Broad cause of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A value was null / unset
    NullValue,
    /// Registry host could not be resolved
    RegistryHost,
    /// Job name could not be resolved
    JobName,
    /// Build number could not be resolved
    BuildNumber,
    /// Pipeline script did not compile
    Syntax,
    /// Docker daemon or buildx problem
    Docker,
    /// Permission or access denied
    Permission,
    /// Network trouble
    Network,
}

impl ErrorCategory {
    /// Every category, in reporting order
    pub const ALL: [Self; 8] = [
        Self::NullValue,
        Self::RegistryHost,
        Self::JobName,
        Self::BuildNumber,
        Self::Syntax,
        Self::Docker,
        Self::Permission,
        Self::Network,
    ];

    /// Lower-case keywords that select this category
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::NullValue => &["null"],
            Self::RegistryHost => &["registry_host"],
            Self::JobName => &["job_name"],
            Self::BuildNumber => &["build_number"],
            Self::Syntax => &["compilation", "syntax"],
            Self::Docker => &["docker"],
            Self::Permission => &["permission", "access"],
            Self::Network => &["network", "connection", "timeout"],
        }
    }

    /// Fixed suggestions for this category
    #[must_use]
    pub fn suggestions(self) -> &'static [&'static str] {
        match self {
            Self::NullValue => &[
                "A value was null: check that every config field is set or has a fallback",
                "Print the resolved configuration before the build to see which field is empty",
            ],
            Self::RegistryHost => &[
                "Set REGISTRY_HOST in the job environment or pass 'host' in the build config",
                "Check the credentials binding that is expected to provide REGISTRY_HOST",
            ],
            Self::JobName => &[
                "JOB_NAME is only set inside a CI job; pass 'project' explicitly when running locally",
            ],
            Self::BuildNumber => &[
                "BUILD_NUMBER is only set inside a CI job; pass 'tag' explicitly when running locally",
            ],
            Self::Syntax => &[
                "The pipeline script failed to compile: check quotes and ${...} interpolation",
                "Use double quotes for strings that interpolate variables",
            ],
            Self::Docker => &[
                "Check that the Docker daemon is running and reachable from the agent",
                "Check that the buildx builder exists (docker buildx ls)",
                "Check registry login (docker login <host>)",
            ],
            Self::Permission => &[
                "Check that the agent user is in the docker group or can reach the socket",
                "Check registry credentials and push permissions for the repository",
            ],
            Self::Network => &[
                "Check network connectivity from the agent to the registry",
                "Retry later: the registry or a base image mirror may be temporarily unavailable",
                "Check proxy settings (HTTP_PROXY, HTTPS_PROXY, NO_PROXY)",
            ],
        }
    }

    fn matches(self, lowered: &str) -> bool {
        self.keywords().iter().any(|k| lowered.contains(k))
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NullValue => "null value",
            Self::RegistryHost => "registry host",
            Self::JobName => "job name",
            Self::BuildNumber => "build number",
            Self::Syntax => "syntax",
            Self::Docker => "docker",
            Self::Permission => "permission",
            Self::Network => "network",
        };
        f.write_str(name)
    }
}

/// Outcome of [`analyze_and_suggest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    /// Original error text
    pub error: String,
    /// Caller supplied context
    pub context: String,
    /// Matched categories
    pub categories: Vec<ErrorCategory>,
    /// Suggestions for every matched category
    pub suggestions: Vec<String>,
    /// Commands worth running by hand
    pub debug_commands: Vec<String>,
}

/// Classifies `error` by keyword and collects suggestions
#[must_use]
pub fn analyze_and_suggest(error: &str, context: &str) -> Diagnosis {
    let lowered = error.to_lowercase();
    let categories: Vec<ErrorCategory> = ErrorCategory::ALL
        .into_iter()
        .filter(|c| c.matches(&lowered))
        .collect();

    let mut suggestions: Vec<String> = categories
        .iter()
        .flat_map(|c| c.suggestions().iter().map(|s| (*s).to_string()))
        .collect();
    if suggestions.is_empty() {
        suggestions.push("No known pattern matched; read the full build log above".to_string());
    }

    Diagnosis {
        error: error.to_string(),
        context: context.to_string(),
        categories,
        suggestions,
        debug_commands: DEBUG_COMMANDS.iter().map(|c| (*c).to_string()).collect(),
    }
}
