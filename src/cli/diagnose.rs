//! `buildline diagnose` - Classify an error and suggest fixes

use super::FormatArg;
use anyhow::{Context, Result};
use buildline::{Diagnosis, analyze_and_suggest};
use std::fmt::Write as _;

pub fn run_diagnose(error: &str, context: &str, format: FormatArg) -> Result<String> {
    let diagnosis = analyze_and_suggest(error, context);
    match format {
        FormatArg::Json => {
            serde_json::to_string_pretty(&diagnosis).context("Failed to serialize diagnosis")
        }
        FormatArg::Text => Ok(render_text(&diagnosis)),
    }
}

fn render_text(diagnosis: &Diagnosis) -> String {
    let mut output = String::new();
    if !diagnosis.categories.is_empty() {
        let names: Vec<String> = diagnosis.categories.iter().map(ToString::to_string).collect();
        let _ = writeln!(output, "Likely cause: {}", names.join(", "));
    }
    let _ = writeln!(output, "Suggestions:");
    for suggestion in &diagnosis.suggestions {
        let _ = writeln!(output, "  - {suggestion}");
    }
    let _ = writeln!(output, "Debug commands:");
    for command in &diagnosis.debug_commands {
        let _ = writeln!(output, "  $ {command}");
    }
    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lists_cause_and_commands() {
        let text = run_diagnose("network timeout", "", FormatArg::Text).unwrap();
        assert!(text.starts_with("Likely cause: network"));
        assert!(text.contains("  $ docker buildx ls"));
    }

    #[test]
    fn test_unmatched_error_has_no_cause_line() {
        let text = run_diagnose("weird", "", FormatArg::Text).unwrap();
        assert!(text.starts_with("Suggestions:"));
    }

    #[test]
    fn test_json_output() {
        let json = run_diagnose("permission denied", "push", FormatArg::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["categories"][0], "permission");
        assert_eq!(value["context"], "push");
    }
}
