//! Query evaluation error types
//!
//! A predicate, projection, order key, or group key referencing an
//! undeclared field is an evaluation error, never a silent non-match.

use thiserror::Error;

use crate::assoc::AssocError;
use crate::schema::SchemaError;

/// Result type for query evaluation
pub type QueryResult<T> = Result<T, QueryError>;

/// Query evaluation errors
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Field reference not declared on the model (and not the pk alias)
    #[error("unknown field '{field}' on model '{model}'")]
    UnknownField {
        /// Model name
        model: String,
        /// Offending field reference
        field: String,
    },

    /// An aggregate function used where a per-row value is required
    #[error("aggregate '{function}' cannot be evaluated per row")]
    AggregateInRowContext {
        /// Function name
        function: String,
    },

    /// LIKE pattern failed to compile
    #[error("invalid LIKE pattern '{pattern}': {reason}")]
    BadPattern {
        /// The offending pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// Unknown model or association in the query
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Eager-loading resolution failure
    #[error(transparent)]
    Assoc(#[from] AssocError),
}

impl QueryError {
    /// Unknown-field constructor
    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        QueryError::UnknownField {
            model: model.into(),
            field: field.into(),
        }
    }
}
