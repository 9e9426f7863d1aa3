//! Association resolver
//!
//! Uniform resolution interface over (record, association name) instead of
//! per-model generated accessor methods. Lazy resolution scans the target
//! model; many-to-many resolution goes through the join model in two
//! steps. Eager loading reuses the same resolver once per matched source
//! row.

use serde_json::{json, Map, Value};

use crate::schema::{AssociationDef, AssociationKind, SchemaError, SchemaRegistry};
use crate::store::{Record, RowStore, SnapshotRead};

use super::errors::{AssocError, AssocResult};

/// Resolution result: one-to-one gives at most one record, the other
/// kinds give a sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Singular association target
    One(Option<Record>),
    /// Plural association targets in target scan order
    Many(Vec<Record>),
}

impl Related {
    /// Unwraps a singular result; plural results yield their first record
    pub fn into_one(self) -> Option<Record> {
        match self {
            Related::One(rec) => rec,
            Related::Many(mut recs) => {
                if recs.is_empty() {
                    None
                } else {
                    Some(recs.remove(0))
                }
            }
        }
    }

    /// Unwraps to a sequence; a singular result becomes zero or one record
    pub fn into_many(self) -> Vec<Record> {
        match self {
            Related::One(Some(rec)) => vec![rec],
            Related::One(None) => Vec::new(),
            Related::Many(recs) => recs,
        }
    }

    /// Number of linked records
    pub fn len(&self) -> usize {
        match self {
            Related::One(Some(_)) => 1,
            Related::One(None) => 0,
            Related::Many(recs) => recs.len(),
        }
    }

    /// Returns true if nothing is linked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves declared associations against a row snapshot
pub struct AssociationResolver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> AssociationResolver<'a> {
    /// Creates a resolver over the given registry
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Resolves the records linked to `source` through the named
    /// association (lazy loading).
    pub fn get_related<S: SnapshotRead>(
        &self,
        snapshot: &S,
        source: &Record,
        name: &str,
    ) -> AssocResult<Related> {
        let assoc = self.registry.association(&source.model, name)?;
        match &assoc.kind {
            AssociationKind::OneToOne => {
                let target = self
                    .scan_by_fk(snapshot, &assoc.target, &assoc.foreign_key, source.pk)
                    .into_iter()
                    .next();
                Ok(Related::One(target))
            }
            AssociationKind::OneToMany => Ok(Related::Many(self.scan_by_fk(
                snapshot,
                &assoc.target,
                &assoc.foreign_key,
                source.pk,
            ))),
            AssociationKind::ManyToMany { through } => {
                let target_key = assoc.target_key.as_deref().ok_or_else(|| {
                    AssocError::Schema(SchemaError::invalid_definition(format!(
                        "association '{}' has no target key",
                        name
                    )))
                })?;
                // Step one: join rows pointing at the source.
                let linked_pks: Vec<i64> = snapshot
                    .model_rows(through)
                    .iter()
                    .filter(|row| fk_value(row, &assoc.foreign_key) == Some(source.pk))
                    .filter_map(|row| fk_value(row, target_key))
                    .collect();
                // Step two: target rows whose pk is in the join subset.
                let targets = snapshot
                    .model_rows(&assoc.target)
                    .into_iter()
                    .filter(|row| linked_pks.contains(&row.pk))
                    .collect();
                Ok(Related::Many(targets))
            }
        }
    }

    /// Points a one-to-one target at the source, clearing any previous
    /// target first (replace semantics).
    ///
    /// # Errors
    ///
    /// `NotFound` if the target pk is stale; non-singular associations are
    /// rejected.
    pub fn set_related(
        &self,
        store: &mut RowStore,
        source: &Record,
        name: &str,
        target_pk: i64,
    ) -> AssocResult<Record> {
        let assoc = self.registry.association(&source.model, name)?;
        if !assoc.kind.is_singular() {
            return Err(AssocError::Schema(SchemaError::invalid_definition(format!(
                "association '{}' is {}; use add_related",
                name,
                assoc.kind.kind_name()
            ))));
        }
        let target_def = self.registry.model(&assoc.target)?.clone();
        store.get(&assoc.target, target_pk)?;

        let previous: Vec<i64> = store
            .scan(&assoc.target)
            .iter()
            .filter(|row| {
                row.pk != target_pk && fk_value(row, &assoc.foreign_key) == Some(source.pk)
            })
            .map(|row| row.pk)
            .collect();
        for pk in previous {
            store.update(&target_def, pk, &fk_change(&assoc.foreign_key, Value::Null))?;
        }

        let updated = store.update(
            &target_def,
            target_pk,
            &fk_change(&assoc.foreign_key, json!(source.pk)),
        )?;
        Ok(updated)
    }

    /// Links a target record to the source.
    ///
    /// One-to-many: sets the target's foreign key. Many-to-many: inserts a
    /// join record; a duplicate pair is a uniqueness violation.
    pub fn add_related(
        &self,
        store: &mut RowStore,
        source: &Record,
        name: &str,
        target_pk: i64,
    ) -> AssocResult<Record> {
        let assoc = self.registry.association(&source.model, name)?;
        match &assoc.kind {
            AssociationKind::OneToOne => Err(AssocError::Schema(
                SchemaError::invalid_definition(format!(
                    "association '{}' is one-to-one; use set_related",
                    name
                )),
            )),
            AssociationKind::OneToMany => {
                let target_def = self.registry.model(&assoc.target)?.clone();
                store.get(&assoc.target, target_pk)?;
                let updated = store.update(
                    &target_def,
                    target_pk,
                    &fk_change(&assoc.foreign_key, json!(source.pk)),
                )?;
                Ok(updated)
            }
            AssociationKind::ManyToMany { through } => {
                store.get(&assoc.target, target_pk)?;
                let join_def = self.registry.model(through)?.clone();
                let fields = Self::join_fields(assoc, source.pk, target_pk);
                let join = store.insert(&join_def, fields)?;
                Ok(join)
            }
        }
    }

    /// Builds the join-record field set for a many-to-many link
    pub fn join_fields(assoc: &AssociationDef, source_pk: i64, target_pk: i64) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(assoc.foreign_key.clone(), json!(source_pk));
        if let Some(target_key) = &assoc.target_key {
            fields.insert(target_key.clone(), json!(target_pk));
        }
        fields
    }

    fn scan_by_fk<S: SnapshotRead>(
        &self,
        snapshot: &S,
        target: &str,
        fk: &str,
        source_pk: i64,
    ) -> Vec<Record> {
        snapshot
            .model_rows(target)
            .into_iter()
            .filter(|row| fk_value(row, fk) == Some(source_pk))
            .collect()
    }
}

fn fk_value(record: &Record, field: &str) -> Option<i64> {
    record.get_non_null(field).and_then(|v| v.as_i64())
}

fn fk_change(field: &str, value: Value) -> Map<String, Value> {
    let mut changes = Map::new();
    changes.insert(field.to_string(), value);
    changes
}
