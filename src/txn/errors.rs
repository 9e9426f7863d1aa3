//! Transaction error types

use thiserror::Error;
use uuid::Uuid;

use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for transaction operations
pub type TxnResult<T> = Result<T, TxnError>;

/// Transaction lifecycle and commit errors
#[derive(Debug, Error)]
pub enum TxnError {
    /// Transaction id was never issued by this log
    #[error("unknown transaction '{id}'")]
    UnknownTransaction {
        /// The unrecognized id
        id: Uuid,
    },

    /// Operation on a transaction that already reached a terminal state
    #[error("transaction '{id}' is already {state}")]
    Closed {
        /// Transaction id
        id: Uuid,
        /// The terminal state it is in
        state: &'static str,
    },

    /// A buffered operation failed at commit; the whole transaction was
    /// rolled back and none of its effects are visible.
    #[error("commit aborted, transaction rolled back: {source}")]
    Aborted {
        /// The first violation encountered while applying
        #[source]
        source: StoreError,
    },

    /// A buffered operation referenced an unknown model at commit
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
