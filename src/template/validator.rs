//! Offline validation of a loaded template set.
//!
//! Nothing here talks to the registry. Errors make the set unusable;
//! warnings are reported but do not block a run.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{DeployError, Result, TemplateError};

use super::spec::{LocalTemplate, RESERVED_LABELS};

/// Maximum display name length accepted by the registry.
pub const MAX_DISPLAY_NAME_LEN: usize = 128;

/// Maximum length of a label key or value.
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum number of user labels, leaving room for the reserved ones.
pub const MAX_USER_LABELS: usize = 64 - RESERVED_LABELS.len();

/// Validator for local template sets.
#[derive(Debug, Default)]
pub struct TemplateValidator;

/// Validation result containing all issues found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationIssue>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The template file and field that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl TemplateValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks a template set and returns every issue found.
    #[must_use]
    pub fn check(&self, templates: &[LocalTemplate]) -> ValidationResult {
        let mut result = ValidationResult::default();

        if templates.is_empty() {
            result.warnings.push(String::from("No templates found"));
            return result;
        }

        let mut seen: HashMap<&str, &LocalTemplate> = HashMap::new();

        for template in templates {
            let prefix = template.source_label();

            if let Some(first) = seen.get(template.display_name.as_str()) {
                result.warnings.push(format!(
                    "{prefix}: display name '{}' is also used by {}",
                    template.display_name,
                    first.source_label()
                ));
            } else {
                seen.insert(&template.display_name, template);
            }

            Self::check_display_name(template, &prefix, &mut result);
            Self::check_labels(template, &prefix, &mut result);
        }

        result
    }

    /// Validates a template set.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, templates: &[LocalTemplate]) -> Result<ValidationResult> {
        let result = self.check(templates);

        match result.errors.first() {
            None => {
                debug!("Template validation passed");
                Ok(result)
            }
            Some(first) => Err(DeployError::Template(TemplateError::validation(
                first.message.clone(),
                first.field.clone(),
            ))),
        }
    }

    fn check_display_name(template: &LocalTemplate, prefix: &str, result: &mut ValidationResult) {
        let len = template.display_name.chars().count();
        if len > MAX_DISPLAY_NAME_LEN {
            result.errors.push(ValidationIssue {
                field: format!("{prefix}.displayName"),
                message: format!(
                    "Display name is {len} characters, maximum is {MAX_DISPLAY_NAME_LEN}"
                ),
            });
        }
    }

    fn check_labels(template: &LocalTemplate, prefix: &str, result: &mut ValidationResult) {
        let user_labels = template
            .labels
            .keys()
            .filter(|k| !RESERVED_LABELS.contains(&k.as_str()))
            .count();
        if user_labels > MAX_USER_LABELS {
            result.errors.push(ValidationIssue {
                field: format!("{prefix}.labels"),
                message: format!("{user_labels} labels defined, maximum is {MAX_USER_LABELS}"),
            });
        }

        for (key, value) in &template.labels {
            let field = format!("{prefix}.labels.{key}");

            if RESERVED_LABELS.contains(&key.as_str()) {
                result.warnings.push(format!(
                    "{field}: '{key}' is set by the deployer and will be overwritten"
                ));
                continue;
            }

            if !is_valid_label_key(key) {
                result.errors.push(ValidationIssue {
                    field: field.clone(),
                    message: format!(
                        "Label key '{key}' is invalid. Must start with a lowercase letter and \
                         contain only lowercase letters, digits, '_' or '-' (max {MAX_LABEL_LEN})."
                    ),
                });
            }

            if !is_valid_label_value(value) {
                result.errors.push(ValidationIssue {
                    field,
                    message: format!(
                        "Label value '{value}' is invalid. Only lowercase letters, digits, \
                         '_' or '-' are allowed (max {MAX_LABEL_LEN})."
                    ),
                });
            }
        }
    }
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

/// Label keys start with a lowercase letter.
fn is_valid_label_key(key: &str) -> bool {
    if key.is_empty() || key.chars().count() > MAX_LABEL_LEN {
        return false;
    }

    let mut chars = key.chars();

    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase()
    {
        return false;
    }

    chars.all(is_label_char)
}

/// Label values may be empty.
fn is_valid_label_value(value: &str) -> bool {
    value.chars().count() <= MAX_LABEL_LEN && value.chars().all(is_label_char)
}
