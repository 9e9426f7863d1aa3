//! Observability for tabula
//!
//! Structured, synchronous JSON event logging. The database facade emits
//! one event per mutation and transaction boundary when enabled in the
//! configuration.

mod logger;

pub use logger::{Logger, Severity};
