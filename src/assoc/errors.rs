//! Association resolution error types

use thiserror::Error;

use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for association resolution
pub type AssocResult<T> = Result<T, AssocError>;

/// Association resolution errors
#[derive(Debug, Clone, Error)]
pub enum AssocError {
    /// Unknown model or association name
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Target lookup miss or duplicate join pair
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AssocError {
    /// Returns true for uniqueness failures (duplicate join pair)
    pub fn is_uniqueness(&self) -> bool {
        matches!(self, AssocError::Store(e) if e.is_uniqueness())
    }
}
