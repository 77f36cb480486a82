//! `buildline build` - Build and push an image

use super::FormatArg;
use anyhow::{Context, Result};
use buildline::{
    BuildConfig, BuildOptions, BuildOutcome, ParsedBuildCommand, StepContext, build_docker_image,
};
use std::fmt::Write as _;

pub fn run_build(
    ctx: &StepContext,
    config: &BuildConfig,
    dry_run: bool,
    attempts: Option<usize>,
    format: FormatArg,
) -> Result<String> {
    let options = BuildOptions {
        dry_run,
        max_attempts: attempts,
    };
    let outcome = build_docker_image(ctx, config, options)?;
    render(&outcome, format)
}

fn render(outcome: &BuildOutcome, format: FormatArg) -> Result<String> {
    match format {
        FormatArg::Json => {
            serde_json::to_string_pretty(outcome).context("Failed to serialize build outcome")
        }
        FormatArg::Text => {
            let mut output = String::new();
            if outcome.executed {
                let _ = writeln!(output, "Pushed:");
                for image in &outcome.images {
                    let _ = writeln!(output, "  {image}");
                }
                let _ = write!(output, "Attempts: {}", outcome.attempts);
                if outcome.used_fallback {
                    output.push_str(" (fallback without cache)");
                }
            } else {
                let _ = writeln!(output, "{}", outcome.command);
                explain(&mut output, &outcome.command)?;
            }
            Ok(output.trim_end().to_string())
        }
    }
}

/// Breaks a rendered command down field by field
fn explain(output: &mut String, command: &str) -> Result<()> {
    let parsed = ParsedBuildCommand::parse_line(command)
        .with_context(|| format!("Rendered command is not parseable: {command}"))?;

    let _ = writeln!(output);
    let _ = writeln!(output, "  builder:    {}", parsed.builder);
    let _ = writeln!(output, "  registry:   {}", parsed.host);
    let _ = writeln!(output, "  project:    {}", parsed.project.as_deref().unwrap_or("-"));
    let _ = writeln!(output, "  image:      {}:{}", parsed.name, parsed.tag);
    let _ = writeln!(output, "  platform:   {}", parsed.platform);
    let _ = writeln!(output, "  dockerfile: {}", parsed.path);
    let _ = writeln!(output, "  cache:      {}", if parsed.cache { "registry" } else { "off" });
    for arg in &parsed.build_args {
        let _ = writeln!(output, "  build-arg:  {arg}");
    }
    Ok(())
}
