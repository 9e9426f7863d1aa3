//! # tabula
//!
//! A strict, deterministic, embeddable in-memory relational evaluator.
//!
//! Models and associations are declared up front against a schema
//! registry; records live in an ordered per-model row store with
//! monotonic, never-reused primary keys. Every mutation is validated
//! before it lands, queries run through a declarative filter, projection,
//! order, and group pipeline, associations resolve through one uniform
//! interface, and transactions buffer validated writes for an atomic
//! commit.
//!
//! ```
//! use serde_json::json;
//! use tabula::db::Database;
//! use tabula::query::{Predicate, QueryOptions};
//! use tabula::schema::{FieldDef, ModelDef};
//!
//! # fn main() -> Result<(), tabula::db::DbError> {
//! let mut db = Database::new();
//! db.define_model(
//!     ModelDef::new("Question")
//!         .field(FieldDef::string("title").not_null())
//!         .field(FieldDef::string("answer")),
//! )?;
//!
//! db.create(
//!     "Question",
//!     json!({"title": "Capital of France", "answer": "Paris"})
//!         .as_object()
//!         .cloned()
//!         .unwrap(),
//! )?;
//!
//! let rows = db.find(
//!     "Question",
//!     &QueryOptions::new().filter(Predicate::eq("answer", json!("Paris"))),
//! )?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod assoc;
pub mod config;
pub mod db;
pub mod observe;
pub mod query;
pub mod schema;
pub mod store;
pub mod txn;
pub mod validate;

pub use config::DatabaseConfig;
pub use db::{Database, DbError, DbResult};
