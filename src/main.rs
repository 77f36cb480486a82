//! buildline - Docker buildx steps for CI pipelines
//!
//! ## Commands
//!
//! - `buildline build` - Validate, render and run `docker buildx build`
//! - `buildline validate` - Report configuration errors, warnings and suggestions
//! - `buildline diagnose` - Suggest fixes for a build error message
//! - `buildline completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Show the command a config renders to
//! buildline build -c build.yaml -e REGISTRY_HOST=registry.example.com --dry-run
//!
//! # Validate before committing
//! buildline validate -c build.yaml --strict
//!
//! # Ask for hints about a failure
//! buildline diagnose "permission denied while trying to connect to the docker daemon"
//! ```

use buildline::BuildError;
use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(build_error) = e.downcast_ref::<BuildError>() {
                for suggestion in build_error.suggestions() {
                    eprintln!("  SUGGESTION: {suggestion}");
                }
            }
            if std::env::var("BUILDLINE_VERBOSE").is_ok() {
                eprintln!("{e:?}");
            }
            ExitCode::FAILURE
        }
    }
}
