//! Validator subsystem for tabula
//!
//! Validation runs before any store mutation and is all-or-nothing: a
//! non-empty violation list rejects the whole mutation and leaves prior
//! record state untouched. All violations are collected in one pass.

mod errors;
mod rules;
mod validator;

pub use errors::{ValidationError, ValidationResult, Violation};
pub use rules::{FieldCheck, FieldRule, ModelCheck, ModelRule};
pub use validator::Validator;
