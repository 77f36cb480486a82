//! CLI for buildline
//!
//! - `build`: validate, render and run a `docker buildx build`
//! - `validate`: report problems in a build configuration
//! - `diagnose`: classify an error message and suggest fixes
//! - `completions`: generate shell completions

pub mod build;
pub mod completions;
pub mod diagnose;
pub mod validate;

use anyhow::{Context, Result};
use buildline::{BuildConfig, MapSource, OutputFormat, Settings, StepContext};
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// CLI arguments for buildline
#[derive(Parser, Debug)]
#[command(name = "buildline")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file (defaults to ./buildline.yaml when present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and push an image with docker buildx
    Build {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        context: ContextArgs,
        /// Print the command instead of running it
        #[arg(long)]
        dry_run: bool,
        /// Attempts before giving up (overrides settings)
        #[arg(long)]
        attempts: Option<usize>,
        /// Output format
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },

    /// Validate a build configuration without running anything
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        context: ContextArgs,
        /// Exit non-zero when errors are found
        #[arg(long)]
        strict: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },

    /// Suggest fixes for a build error message
    Diagnose {
        /// Error text to analyze
        error: String,
        /// Extra context (command line, stage name)
        #[arg(long, default_value = "")]
        context: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: completions::ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Build configuration: a file, overridden field by field by flags
#[derive(ClapArgs, Debug, Default)]
pub struct ConfigArgs {
    /// Build configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Image name
    #[arg(long)]
    pub name: Option<String>,
    /// Registry host
    #[arg(long)]
    pub host: Option<String>,
    /// Project (registry namespace)
    #[arg(long)]
    pub project: Option<String>,
    /// Image tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Target platform(s), comma separated
    #[arg(long)]
    pub platform: Option<String>,
    /// Dockerfile path
    #[arg(short = 'f', long = "file")]
    pub path: Option<String>,
    /// Use the registry build cache
    #[arg(long, overrides_with = "no_cache")]
    pub cache: bool,
    /// Do not use the registry build cache
    #[arg(long)]
    pub no_cache: bool,
    /// Build argument KEY=VALUE (repeatable)
    #[arg(long = "build-arg")]
    pub build_args: Vec<String>,
    /// buildx progress mode
    #[arg(long)]
    pub progress: Option<String>,
}

impl ConfigArgs {
    /// Loads the config file (if any) and applies flag overrides
    pub fn load(&self) -> Result<BuildConfig> {
        let base = match &self.config {
            Some(path) => BuildConfig::from_file(path)
                .with_context(|| format!("Failed to load build config: {}", path.display()))?,
            None => BuildConfig::default(),
        };

        let enable_cache = match (self.cache, self.no_cache) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };

        Ok(base.merged(BuildConfig {
            host: self.host.clone(),
            project: self.project.clone(),
            name: self.name.clone(),
            tag: self.tag.clone(),
            platform: self.platform.clone(),
            path: self.path.clone(),
            enable_cache,
            build_args: (!self.build_args.is_empty()).then(|| self.build_args.clone()),
            progress: self.progress.clone(),
        }))
    }
}

/// Pipeline environment and parameters given on the command line
#[derive(ClapArgs, Debug, Default)]
pub struct ContextArgs {
    /// Stage environment variable KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,
    /// Build parameter KEY=VALUE (repeatable)
    #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
}

impl ContextArgs {
    /// Builds a step context over a real shell
    pub fn into_context(self, settings: Settings) -> StepContext {
        let mut env = MapSource::new("env");
        env.extend(self.env);
        let mut params = MapSource::new("params");
        params.extend(self.params);
        StepContext::new(settings, env, params)
    }
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

fn load_settings(path: Option<&Path>, verbose: bool) -> Result<Settings> {
    let mut settings = Settings::load(path).context("Failed to load settings")?;
    if verbose {
        settings.log_level = "debug".to_string();
    }
    Ok(settings)
}

/// Parse and execute CLI arguments
pub fn run() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.settings.as_deref(), args.verbose)?;
    buildline::init_logging(&settings.log_level);

    match args.command {
        Command::Build {
            config,
            context,
            dry_run,
            attempts,
            format,
        } => {
            let config = config.load()?;
            let ctx = context.into_context(settings);
            let output = build::run_build(&ctx, &config, dry_run, attempts, format)?;
            println!("{output}");
        }
        Command::Validate {
            config,
            context,
            strict,
            format,
        } => {
            let config = config.load()?;
            let ctx = context.into_context(settings);
            let output = validate::run_validate(&ctx, &config, strict, format)?;
            println!("{output}");
        }
        Command::Diagnose {
            error,
            context,
            format,
        } => {
            println!("{}", diagnose::run_diagnose(&error, &context, format)?);
        }
        Command::Completions { shell, output } => {
            if let Some(script) = completions::run_completions(shell, output.as_deref())? {
                println!("{script}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("build.yaml");
        std::fs::write(&path, "name: app\ntag: '1'\nenableCache: true\n").unwrap();

        let args = ConfigArgs {
            config: Some(path),
            tag: Some("2".to_string()),
            no_cache: true,
            build_args: vec!["A=1".to_string()],
            ..ConfigArgs::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.name.as_deref(), Some("app"));
        assert_eq!(config.tag.as_deref(), Some("2"));
        assert_eq!(config.enable_cache, Some(false));
        assert_eq!(config.build_args, Some(vec!["A=1".to_string()]));
    }

    #[test]
    fn test_parse_build_command_line() {
        let args = Args::try_parse_from([
            "buildline",
            "build",
            "--name",
            "app",
            "--build-arg",
            "A=1",
            "--build-arg",
            "B=2",
            "-e",
            "REGISTRY_HOST=r.io",
            "--dry-run",
        ])
        .unwrap();
        match args.command {
            Command::Build {
                config,
                context,
                dry_run,
                ..
            } => {
                assert!(dry_run);
                assert_eq!(config.build_args, vec!["A=1", "B=2"]);
                assert_eq!(
                    context.env,
                    vec![("REGISTRY_HOST".to_string(), "r.io".to_string())]
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
