//! Error types for configuration loading and validation

use std::path::PathBuf;
use thiserror::Error;
use validator::ValidationErrors;

/// Unified configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found error.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration validation error.
    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    /// Figment parsing error.
    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    for (path, field_errors) in flatten(errors, String::new()) {
        let _ = writeln!(output, "Field '{}':", path);
        for error in field_errors {
            let message = match &error.message {
                Some(msg) => msg.to_string(),
                None => error.code.to_string(),
            };
            let _ = writeln!(output, "  - {}", message);
        }
    }
    output
}

// Nested sections report their errors under `section.field`.
fn flatten(
    errors: &ValidationErrors,
    prefix: String,
) -> Vec<(String, Vec<validator::ValidationError>)> {
    use validator::ValidationErrorsKind;

    let mut out = Vec::new();
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => out.push((path, errs.clone())),
            ValidationErrorsKind::Struct(nested) => out.extend(flatten(nested, path)),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    out.extend(flatten(nested, format!("{path}[{idx}]")));
                }
            }
        }
    }
    out
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}
