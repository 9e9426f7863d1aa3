//! Schema Registry subsystem for tabula
//!
//! Models and associations are first-class artifacts registered up front
//! and immutable afterwards. Mutations and queries are checked against
//! these definitions; unknown models, fields, and associations are
//! rejected rather than accepted as arbitrary keys.

mod association;
mod errors;
mod registry;
mod types;

pub use association::{AssociationDef, AssociationKind, AssociationOptions};
pub use errors::{SchemaError, SchemaErrorCode, SchemaResult};
pub use registry::SchemaRegistry;
pub use types::{FieldDef, FieldType, ModelDef};
