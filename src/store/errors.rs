//! Row store error types

use serde_json::Value;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Row store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Primary key lookup miss on get/update/delete
    #[error("record {pk} not found in model '{model}'")]
    NotFound {
        /// Model name
        model: String,
        /// Missing primary key
        pk: i64,
    },

    /// A unique field already holds the candidate value
    #[error("model '{model}' violates unique constraint on '{field}' (value {value})")]
    UniquenessViolation {
        /// Model name
        model: String,
        /// Unique field
        field: String,
        /// Conflicting value
        value: Value,
    },

    /// A join pair already exists
    #[error("model '{model}' violates unique constraint on pair ({left}, {right})")]
    DuplicatePair {
        /// Join model name
        model: String,
        /// First pair field
        left: String,
        /// Second pair field
        right: String,
    },

    /// A foreign-key value points at a primary key that does not exist
    #[error("model '{model}' field '{field}' references missing {references} record {pk}")]
    DanglingReference {
        /// Model carrying the foreign key
        model: String,
        /// Foreign-key field
        field: String,
        /// Model the key references
        references: String,
        /// Missing primary key
        pk: i64,
    },
}

impl StoreError {
    /// Not-found constructor
    pub fn not_found(model: impl Into<String>, pk: i64) -> Self {
        StoreError::NotFound {
            model: model.into(),
            pk,
        }
    }

    /// Dangling-reference constructor
    pub fn dangling_reference(
        model: impl Into<String>,
        field: impl Into<String>,
        references: impl Into<String>,
        pk: i64,
    ) -> Self {
        StoreError::DanglingReference {
            model: model.into(),
            field: field.into(),
            references: references.into(),
            pk,
        }
    }

    /// Returns true for uniqueness failures (field or pair)
    pub fn is_uniqueness(&self) -> bool {
        matches!(
            self,
            StoreError::UniquenessViolation { .. } | StoreError::DuplicatePair { .. }
        )
    }
}
