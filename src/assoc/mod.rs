//! Association Resolver subsystem for tabula
//!
//! One interface — (record, association name) — for lazy resolution,
//! link mutation, and the eager-loading path of the query engine.

mod errors;
mod resolver;

pub use errors::{AssocError, AssocResult};
pub use resolver::{AssociationResolver, Related};
