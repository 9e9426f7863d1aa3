//! Record type
//!
//! One row of one model: an insert-assigned immutable primary key, the
//! field map, and creation/update timestamps. Destroyed records are
//! removed from the store entirely; there is no tombstone state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Owning model name
    pub model: String,
    /// Primary key, assigned on insert, immutable, unique within the model
    pub pk: i64,
    /// Field values keyed by field name
    pub fields: Map<String, Value>,
    /// Insert timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (equals `created_at` until the first update)
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Creates a freshly persisted record stamped with the current time
    pub fn new(model: impl Into<String>, pk: i64, fields: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            model: model.into(),
            pk,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Field value by name; absent fields read as `None`
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field value by name, with absent and explicit-null both mapped to
    /// `None`
    pub fn get_non_null(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Merges a change set into the field map and bumps `updated_at`
    pub(crate) fn apply_changes(&mut self, changes: &Map<String, Value>) {
        for (key, value) in changes {
            self.fields.insert(key.clone(), value.clone());
        }
        self.updated_at = Utc::now();
    }
}
