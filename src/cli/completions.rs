//! `buildline completions` - Generate shell completions

use anyhow::{Context, Result};
use clap::ValueEnum;
use clap_complete::{Shell, generate};
use std::fs;
use std::path::Path;

const BIN_NAME: &str = "buildline";

/// Shells completions can be generated for
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl From<ShellArg> for Shell {
    fn from(shell: ShellArg) -> Self {
        match shell {
            ShellArg::Bash => Shell::Bash,
            ShellArg::Zsh => Shell::Zsh,
            ShellArg::Fish => Shell::Fish,
            ShellArg::PowerShell => Shell::PowerShell,
            ShellArg::Elvish => Shell::Elvish,
        }
    }
}

/// Renders the completion script for `shell`
pub fn render(shell: ShellArg) -> Result<String> {
    let mut cmd = super::build_cli();
    let mut buf = Vec::new();
    generate(Shell::from(shell), &mut cmd, BIN_NAME, &mut buf);
    String::from_utf8(buf).with_context(|| format!("{shell:?} completions are not UTF-8"))
}

/// Writes the script to `output`, or returns it for stdout when no path is given
pub fn run_completions(shell: ShellArg, output: Option<&Path>) -> Result<Option<String>> {
    let script = render(shell)?;
    match output {
        Some(path) => {
            fs::write(path, &script)
                .with_context(|| format!("Failed to write completions to: {}", path.display()))?;
            tracing::info!(path = %path.display(), ?shell, "Completions written");
            Ok(None)
        }
        None => Ok(Some(script)),
    }
}
