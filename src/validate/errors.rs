//! Validation error types
//!
//! A failed validation carries the full violation list; callers never see
//! a partial report, and no store state changes before the list is empty.

use thiserror::Error;

/// One violated rule on a candidate record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field the violation refers to; `None` for model-level rules
    pub field: Option<String>,
    /// Rule identifier ("not_empty", "len", "is_email", custom name, ...)
    pub rule: String,
    /// Human-readable message
    pub message: String,
}

impl Violation {
    /// Violation of a field-level rule
    pub fn field(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Violation of a model-level rule
    pub fn model(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: None,
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Validation failure for one candidate record
#[derive(Debug, Clone, Error)]
#[error("validation failed for model '{model}': {}", summarize(.violations))]
pub struct ValidationError {
    /// Model the candidate belongs to
    pub model: String,
    /// Every violated rule, field rules first, in declaration order
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Bundles violations into an error
    pub fn new(model: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            model: model.into(),
            violations,
        }
    }

    /// Returns true if any violation references the named field
    pub fn mentions_field(&self, field: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.field.as_deref() == Some(field))
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| match &v.field {
            Some(field) => format!("{}: {}", field, v.message),
            None => v.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;
