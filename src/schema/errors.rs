//! Schema error types
//!
//! Error codes:
//! - TAB_DUPLICATE_MODEL
//! - TAB_UNKNOWN_MODEL
//! - TAB_DUPLICATE_ASSOCIATION
//! - TAB_UNKNOWN_ASSOCIATION
//! - TAB_INVALID_DEFINITION
//!
//! All schema errors reject the caller's request; none are fatal.

use std::fmt;

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Model name already registered
    DuplicateModel,
    /// Model name not found
    UnknownModel,
    /// Association name already declared on the source model
    DuplicateAssociation,
    /// Association name not found on the source model
    UnknownAssociation,
    /// Definition rejected (empty name, conflicting foreign key, ...)
    InvalidDefinition,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::DuplicateModel => "TAB_DUPLICATE_MODEL",
            SchemaErrorCode::UnknownModel => "TAB_UNKNOWN_MODEL",
            SchemaErrorCode::DuplicateAssociation => "TAB_DUPLICATE_ASSOCIATION",
            SchemaErrorCode::UnknownAssociation => "TAB_UNKNOWN_ASSOCIATION",
            SchemaErrorCode::InvalidDefinition => "TAB_INVALID_DEFINITION",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with full context
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Error code
    code: SchemaErrorCode,
    /// Human-readable message
    message: String,
    /// Model name if applicable
    model: Option<String>,
}

impl SchemaError {
    /// Create a duplicate model error
    pub fn duplicate_model(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::DuplicateModel,
            message: format!("Model '{}' is already registered", name),
            model: Some(name),
        }
    }

    /// Create an unknown model error
    pub fn unknown_model(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::UnknownModel,
            message: format!("Model '{}' not found", name),
            model: Some(name),
        }
    }

    /// Create a duplicate association error
    pub fn duplicate_association(source: impl Into<String>, name: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            code: SchemaErrorCode::DuplicateAssociation,
            message: format!(
                "Association '{}' is already declared on model '{}'",
                name.into(),
                source
            ),
            model: Some(source),
        }
    }

    /// Create an unknown association error
    pub fn unknown_association(source: impl Into<String>, name: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            code: SchemaErrorCode::UnknownAssociation,
            message: format!(
                "Association '{}' not found on model '{}'",
                name.into(),
                source
            ),
            model: Some(source),
        }
    }

    /// Create an invalid definition error
    pub fn invalid_definition(reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::InvalidDefinition,
            message: reason.into(),
            model: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the model name if applicable
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
