//! Row Store subsystem for tabula
//!
//! Per-model ordered record storage with monotonic never-reused primary
//! keys. Uniqueness (single-field and join-pair) is enforced here;
//! validation runs in the caller before a field set reaches the store.

mod errors;
mod persist;
mod record;
mod store;

pub use errors::{StoreError, StoreResult};
pub use persist::{JsonLinesSink, MemorySink, PersistenceSink};
pub use record::Record;
pub use store::{check_foreign_keys, RowStore, SnapshotRead};
