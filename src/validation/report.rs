//! Validation report and its rendering

use crate::error::BuildError;
use crate::events::{Event, EventSink};
use serde::Serialize;
use std::fmt::Write as _;

/// Findings of a validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Blocking problems
    pub errors: Vec<String>,
    /// Non-blocking problems
    pub warnings: Vec<String>,
    /// Advisory hints
    pub suggestions: Vec<String>,
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable
    #[default]
    Text,
    /// Pretty printed JSON
    Json,
}

impl ValidationReport {
    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub(crate) fn suggest(&mut self, message: impl Into<String>) {
        self.suggestions.push(message.into());
    }

    /// Returns true when there are no errors
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Sends every finding to `sink`
    pub fn emit(&self, sink: &dyn EventSink) {
        for message in &self.errors {
            sink.emit(Event::ValidationError {
                message: message.clone(),
            });
        }
        for message in &self.warnings {
            sink.emit(Event::ValidationWarning {
                message: message.clone(),
            });
        }
        for message in &self.suggestions {
            sink.emit(Event::Suggestion {
                message: message.clone(),
            });
        }
    }

    /// Turns a report with errors into a single aggregated error
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] when any error was recorded.
    pub fn into_result(self) -> Result<Self, BuildError> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(BuildError::Configuration {
                count: self.errors.len(),
                errors: self.errors,
            })
        }
    }

    /// Renders the report
    #[must_use]
    pub fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => {
                if self.errors.is_empty() && self.warnings.is_empty() && self.suggestions.is_empty()
                {
                    return "Configuration OK, no issues found.".to_string();
                }
                let mut output = String::new();
                for (label, items) in [
                    ("ERROR", &self.errors),
                    ("WARNING", &self.warnings),
                    ("SUGGESTION", &self.suggestions),
                ] {
                    for item in items {
                        let _ = writeln!(output, "{label}: {item}");
                    }
                }
                let _ = write!(
                    output,
                    "{} error(s), {} warning(s), {} suggestion(s)",
                    self.errors.len(),
                    self.warnings.len(),
                    self.suggestions.len()
                );
                output
            }
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValidationReport {
        ValidationReport {
            errors: vec!["bad name".to_string()],
            warnings: vec!["no host".to_string()],
            suggestions: vec![],
        }
    }

    #[test]
    fn test_text_format() {
        let text = sample().format(OutputFormat::Text);
        assert!(text.contains("ERROR: bad name"));
        assert!(text.contains("WARNING: no host"));
        assert!(text.ends_with("1 error(s), 1 warning(s), 0 suggestion(s)"));
    }

    #[test]
    fn test_empty_text_format() {
        let text = ValidationReport::default().format(OutputFormat::Text);
        assert!(text.contains("no issues"));
    }

    #[test]
    fn test_json_format() {
        let json = sample().format(OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["errors"][0], "bad name");
        assert_eq!(value["suggestions"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_into_result_ok_without_errors() {
        let report = ValidationReport {
            warnings: vec!["w".to_string()],
            ..ValidationReport::default()
        };
        assert!(report.into_result().is_ok());
    }
}
