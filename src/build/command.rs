//! `docker buildx build` command rendering
//!
//! The rendered command always has the same shape:
//!
//! ```text
//! docker buildx --builder <builder> build --progress=<progress> --platform=<platform>
//!   [--build-arg <arg>]...
//!   -t <repo>:<tag> -t <repo>:latest
//!   [--cache-to type=registry,ref=<repo>:buildcache,mode=max
//!    --cache-from type=registry,ref=<repo>:buildcache]
//!   --push -f <path> .
//! ```
//!
//! # Quoting
//!
//! Values are interpolated as-is. A config value containing shell
//! metacharacters (`;`, `$(...)`, spaces) changes the command that the
//! shell runs. Quoting would change the command line every existing
//! pipeline emits, so callers are responsible for passing plain values.

use super::config::{DEFAULT_TAG, ResolvedBuildConfig, builder_for};
use std::fmt;

const CACHE_TAG: &str = "buildcache";

/// A rendered `docker buildx build` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    tokens: Vec<String>,
}

impl BuildCommand {
    /// Renders the command for `config`
    #[must_use]
    pub fn render(config: &ResolvedBuildConfig) -> Self {
        let mut tokens: Vec<String> = vec![
            "docker".into(),
            "buildx".into(),
            "--builder".into(),
            config.builder_name().into(),
            "build".into(),
            format!("--progress={}", config.progress),
            format!("--platform={}", config.platform),
        ];

        for arg in &config.build_args {
            tokens.push("--build-arg".into());
            tokens.push(arg.clone());
        }

        tokens.push("-t".into());
        tokens.push(config.image(&config.tag));
        tokens.push("-t".into());
        tokens.push(config.image(DEFAULT_TAG));

        if config.enable_cache {
            let cache_ref = config.cache_ref();
            tokens.push("--cache-to".into());
            tokens.push(format!("type=registry,ref={cache_ref},mode=max"));
            tokens.push("--cache-from".into());
            tokens.push(format!("type=registry,ref={cache_ref}"));
        }

        tokens.push("--push".into());
        tokens.push("-f".into());
        tokens.push(config.path.clone());
        tokens.push(".".into());

        Self { tokens }
    }

    /// The command tokens in order
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens joined by single spaces, ready for `sh -c`
    #[must_use]
    pub fn to_shell_line(&self) -> String {
        self.tokens.join(" ")
    }

    /// Returns true when the command carries registry cache flags
    #[must_use]
    pub fn uses_cache(&self) -> bool {
        self.tokens.iter().any(|t| t == "--cache-to" || t == "--cache-from")
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_line())
    }
}

/// Fields recovered from a rendered command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBuildCommand {
    /// Builder name after `--builder`
    pub builder: String,
    /// Registry host
    pub host: String,
    /// Project, the second repository segment when there are three or more.
    ///
    /// A rendered `<host>/<name>` with a nested name such as `team/app` is
    /// indistinguishable from `<host>/<project>/<name>`; it parses as the latter.
    pub project: Option<String>,
    /// Image name
    pub name: String,
    /// Explicit tag (first `-t`)
    pub tag: String,
    /// Platform string
    pub platform: String,
    /// Progress mode
    pub progress: String,
    /// Dockerfile path
    pub path: String,
    /// Build arguments in order
    pub build_args: Vec<String>,
    /// Whether cache flags were present
    pub cache: bool,
    /// Whether `--push` was present
    pub push: bool,
}

/// Why a token list is not a rendered build command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    /// Not a `docker buildx` invocation
    #[error("not a docker buildx command")]
    NotBuildx,
    /// A flag was not followed by its value
    #[error("flag '{0}' is missing its value")]
    MissingValue(String),
    /// A required part was not found
    #[error("missing {0}")]
    Missing(&'static str),
    /// The image reference could not be split
    #[error("malformed image reference '{0}'")]
    BadImage(String),
    /// Shell line could not be split into tokens
    #[error("cannot split command line: {0}")]
    Split(String),
}

impl ParsedBuildCommand {
    /// Splits a shell line and parses it
    ///
    /// # Errors
    ///
    /// Returns [`ParseCommandError`] when the line is not a rendered build command.
    pub fn parse_line(line: &str) -> Result<Self, ParseCommandError> {
        let tokens = shell_words::split(line).map_err(|e| ParseCommandError::Split(e.to_string()))?;
        Self::parse(&tokens)
    }

    /// Parses rendered tokens back into their fields
    ///
    /// # Errors
    ///
    /// Returns [`ParseCommandError`] when the tokens are not a rendered build command.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ParseCommandError> {
        let tokens: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        if tokens.len() < 2 || tokens[0] != "docker" || tokens[1] != "buildx" {
            return Err(ParseCommandError::NotBuildx);
        }

        let mut parsed = Self::default();
        let mut images: Vec<&str> = Vec::new();
        let mut iter = tokens.iter().skip(2);

        while let Some(&token) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .copied()
                    .ok_or_else(|| ParseCommandError::MissingValue(flag.to_string()))
            };
            match token {
                "--builder" => parsed.builder = value(token)?.to_string(),
                "--build-arg" => parsed.build_args.push(value(token)?.to_string()),
                "-t" => images.push(value(token)?),
                "-f" => parsed.path = value(token)?.to_string(),
                "--cache-to" | "--cache-from" => {
                    value(token)?;
                    parsed.cache = true;
                }
                "--push" => parsed.push = true,
                _ => {
                    if let Some(progress) = token.strip_prefix("--progress=") {
                        parsed.progress = progress.to_string();
                    } else if let Some(platform) = token.strip_prefix("--platform=") {
                        parsed.platform = platform.to_string();
                    }
                }
            }
        }

        let image = images.first().ok_or(ParseCommandError::Missing("image tag"))?;
        let (repository, tag) = image
            .rsplit_once(':')
            .ok_or_else(|| ParseCommandError::BadImage((*image).to_string()))?;
        let segments: Vec<&str> = repository.split('/').collect();
        match segments.as_slice() {
            [host, name] if !host.is_empty() && !name.is_empty() => {
                parsed.host = (*host).to_string();
                parsed.name = (*name).to_string();
            }
            [host, project, rest @ ..] if !rest.is_empty() && !rest.contains(&"") => {
                parsed.host = (*host).to_string();
                parsed.project = Some((*project).to_string());
                parsed.name = rest.join("/");
            }
            _ => return Err(ParseCommandError::BadImage((*image).to_string())),
        }
        parsed.tag = tag.to_string();

        if parsed.path.is_empty() {
            return Err(ParseCommandError::Missing("dockerfile path"));
        }
        if parsed.builder.is_empty() {
            parsed.builder = builder_for(&parsed.platform).to_string();
        }

        Ok(parsed)
    }
}
