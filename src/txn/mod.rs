//! Transaction Log subsystem for tabula
//!
//! Transactions buffer validated mutations and apply them atomically at
//! commit. An open transaction reads its own writes; nothing leaks to
//! other readers before commit, and a failed commit rolls the whole
//! transaction back.

mod errors;
mod log;

pub use errors::{TxnError, TxnResult};
pub use log::{PendingOp, TransactionLog, TxnState, TxnView};
