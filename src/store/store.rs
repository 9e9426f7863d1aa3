//! In-memory row store
//!
//! One table per model, rows in insertion order, primary keys assigned
//! from a per-table monotonic counter that never reuses a value, not even
//! after deletes or rolled-back reservations.
//!
//! The store enforces uniqueness (single-field and join-pair); validation
//! runs in the caller before anything reaches these methods. Every
//! mutation is atomic with respect to a single caller: a rejected call
//! leaves no partial write behind.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::schema::{ModelDef, SchemaRegistry};

use super::errors::{StoreError, StoreResult};
use super::record::Record;

#[derive(Debug, Clone, Default)]
struct Table {
    next_pk: i64,
    rows: Vec<Record>,
}

impl Table {
    fn reserve_pk(&mut self) -> i64 {
        self.next_pk += 1;
        self.next_pk
    }

    fn position(&self, pk: i64) -> Option<usize> {
        self.rows.iter().position(|r| r.pk == pk)
    }
}

/// Read seam over committed rows or a transaction's layered view.
///
/// The query engine and association resolver evaluate against this trait
/// so the same code serves plain reads and read-your-writes transaction
/// reads.
pub trait SnapshotRead {
    /// All live records of a model in scan order
    fn model_rows(&self, model: &str) -> Vec<Record>;

    /// Returns true if the model currently holds the primary key
    fn contains_pk(&self, model: &str, pk: i64) -> bool {
        self.model_rows(model).iter().any(|r| r.pk == pk)
    }
}

/// Checks every foreign-key value in a candidate field set against the
/// live primary keys of the model it references.
///
/// Null and absent keys pass (an unlinked row is legal); a non-null key
/// must resolve. Models without implanted keys pass trivially.
pub fn check_foreign_keys<S: SnapshotRead>(
    snapshot: &S,
    registry: &SchemaRegistry,
    model: &str,
    fields: &Map<String, Value>,
) -> StoreResult<()> {
    for (field, references) in registry.foreign_keys_of(model) {
        let pk = match fields.get(&field).and_then(Value::as_i64) {
            Some(pk) => pk,
            None => continue,
        };
        if !snapshot.contains_pk(&references, pk) {
            return Err(StoreError::dangling_reference(model, field, references, pk));
        }
    }
    Ok(())
}

/// Per-model ordered record storage
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    tables: HashMap<String, Table>,
}

impl SnapshotRead for RowStore {
    fn model_rows(&self, model: &str) -> Vec<Record> {
        self.scan(model).to_vec()
    }

    fn contains_pk(&self, model: &str, pk: i64) -> bool {
        self.contains(model, pk)
    }
}

impl RowStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next primary key for a model without inserting.
    ///
    /// Used for buffered transactional inserts so the caller can reference
    /// the row before commit. A reservation that never commits leaves a
    /// gap; the counter is monotonic either way.
    pub fn reserve_pk(&mut self, model: &str) -> i64 {
        self.tables.entry(model.to_string()).or_default().reserve_pk()
    }

    /// Inserts a validated field set, assigning the next primary key.
    pub fn insert(&mut self, def: &ModelDef, fields: Map<String, Value>) -> StoreResult<Record> {
        let pk = self.reserve_pk(&def.name);
        self.insert_with_pk(def, pk, fields)
    }

    /// Inserts under a previously reserved primary key.
    ///
    /// # Errors
    ///
    /// Uniqueness violations (single-field or join pair) reject the insert
    /// with no state change.
    pub fn insert_with_pk(
        &mut self,
        def: &ModelDef,
        pk: i64,
        fields: Map<String, Value>,
    ) -> StoreResult<Record> {
        self.check_unique_fields(def, &fields, None)?;
        self.check_pair_unique(def, &fields)?;

        let record = Record::new(&def.name, pk, fields);
        let table = self.tables.entry(def.name.clone()).or_default();
        // A reserved pk handed out by another path must stay ahead of the
        // counter.
        if pk > table.next_pk {
            table.next_pk = pk;
        }
        table.rows.push(record.clone());
        Ok(record)
    }

    /// Merges a validated change set into an existing record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the primary key was never inserted or was destroyed;
    /// uniqueness violations reject the update with no state change.
    pub fn update(
        &mut self,
        def: &ModelDef,
        pk: i64,
        changes: &Map<String, Value>,
    ) -> StoreResult<Record> {
        self.check_unique_fields(def, changes, Some(pk))?;

        let table = self
            .tables
            .get_mut(&def.name)
            .ok_or_else(|| StoreError::not_found(&def.name, pk))?;
        let index = table
            .position(pk)
            .ok_or_else(|| StoreError::not_found(&def.name, pk))?;

        table.rows[index].apply_changes(changes);
        Ok(table.rows[index].clone())
    }

    /// Removes a record; its primary key is never reassigned.
    pub fn delete(&mut self, model: &str, pk: i64) -> StoreResult<Record> {
        let table = self
            .tables
            .get_mut(model)
            .ok_or_else(|| StoreError::not_found(model, pk))?;
        let index = table
            .position(pk)
            .ok_or_else(|| StoreError::not_found(model, pk))?;
        Ok(table.rows.remove(index))
    }

    /// Record by primary key.
    ///
    /// # Errors
    ///
    /// `NotFound` on a stale or never-assigned key.
    pub fn get(&self, model: &str, pk: i64) -> StoreResult<&Record> {
        self.tables
            .get(model)
            .and_then(|t| t.position(pk).map(|i| &t.rows[i]))
            .ok_or_else(|| StoreError::not_found(model, pk))
    }

    /// Returns true if the primary key currently exists
    pub fn contains(&self, model: &str, pk: i64) -> bool {
        self.get(model, pk).is_ok()
    }

    /// All records of a model in insertion order
    pub fn scan(&self, model: &str) -> &[Record] {
        self.tables.get(model).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    /// Number of live records in a model
    pub fn len(&self, model: &str) -> usize {
        self.scan(model).len()
    }

    /// Returns true if the model holds no records
    pub fn is_empty(&self, model: &str) -> bool {
        self.len(model) == 0
    }

    /// Replaces a model's rows wholesale (persistence hydration).
    ///
    /// The pk counter advances past the highest restored key.
    pub fn load(&mut self, model: &str, rows: Vec<Record>) {
        let table = self.tables.entry(model.to_string()).or_default();
        table.next_pk = rows.iter().map(|r| r.pk).max().unwrap_or(0).max(table.next_pk);
        table.rows = rows;
    }

    fn check_unique_fields(
        &self,
        def: &ModelDef,
        candidate: &Map<String, Value>,
        exclude_pk: Option<i64>,
    ) -> StoreResult<()> {
        for field in def.fields.iter().filter(|f| f.unique) {
            let value = match candidate.get(&field.name).filter(|v| !v.is_null()) {
                Some(v) => v,
                None => continue,
            };
            let taken = self.scan(&def.name).iter().any(|row| {
                Some(row.pk) != exclude_pk && row.get(&field.name) == Some(value)
            });
            if taken {
                return Err(StoreError::UniquenessViolation {
                    model: def.name.clone(),
                    field: field.name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_pair_unique(&self, def: &ModelDef, candidate: &Map<String, Value>) -> StoreResult<()> {
        let (left, right) = match &def.pair_unique {
            Some(pair) => pair,
            None => return Ok(()),
        };
        let (a, b) = match (candidate.get(left), candidate.get(right)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(()),
        };
        let taken = self
            .scan(&def.name)
            .iter()
            .any(|row| row.get(left) == Some(a) && row.get(right) == Some(b));
        if taken {
            return Err(StoreError::DuplicatePair {
                model: def.name.clone(),
                left: left.clone(),
                right: right.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;
    use serde_json::json;

    fn tag_model() -> ModelDef {
        ModelDef::new("Tag").field(FieldDef::string("tag_name").not_null().unique())
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_assigns_monotonic_pks() {
        let mut store = RowStore::new();
        let def = tag_model();

        let a = store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();
        let b = store.insert(&def, fields(json!({"tag_name": "History"}))).unwrap();
        assert_eq!(a.pk, 1);
        assert_eq!(b.pk, 2);
    }

    #[test]
    fn test_pk_never_reused_after_delete() {
        let mut store = RowStore::new();
        let def = tag_model();

        let a = store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();
        store.delete("Tag", a.pk).unwrap();
        let b = store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();
        assert_eq!(b.pk, 2);
    }

    #[test]
    fn test_get_after_insert_and_delete() {
        let mut store = RowStore::new();
        let def = tag_model();

        let rec = store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();
        assert_eq!(store.get("Tag", rec.pk).unwrap(), &rec);

        store.delete("Tag", rec.pk).unwrap();
        assert!(matches!(
            store.get("Tag", rec.pk),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_merges_and_misses_stale_pk() {
        let mut store = RowStore::new();
        let def = ModelDef::new("Question")
            .field(FieldDef::string("title"))
            .field(FieldDef::string("answer"));

        let rec = store
            .insert(&def, fields(json!({"title": "Capital of France", "answer": "Lyon"})))
            .unwrap();
        let updated = store
            .update(&def, rec.pk, &fields(json!({"answer": "Paris"})))
            .unwrap();
        assert_eq!(updated.get("answer"), Some(&json!("Paris")));
        assert_eq!(updated.get("title"), Some(&json!("Capital of France")));

        store.delete("Question", rec.pk).unwrap();
        let err = store
            .update(&def, rec.pk, &fields(json!({"answer": "Nice"})))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_unique_field_rejected() {
        let mut store = RowStore::new();
        let def = tag_model();

        store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();
        let err = store
            .insert(&def, fields(json!({"tag_name": "Geography"})))
            .unwrap_err();
        assert!(err.is_uniqueness());
        // Rejected insert leaves no partial state and burns no visible row.
        assert_eq!(store.len("Tag"), 1);
    }

    #[test]
    fn test_update_unique_excludes_self() {
        let mut store = RowStore::new();
        let def = tag_model();

        let rec = store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();
        // Re-asserting the same value on the same row is fine.
        store
            .update(&def, rec.pk, &fields(json!({"tag_name": "Geography"})))
            .unwrap();

        store.insert(&def, fields(json!({"tag_name": "History"}))).unwrap();
        let err = store
            .update(&def, rec.pk, &fields(json!({"tag_name": "History"})))
            .unwrap_err();
        assert!(err.is_uniqueness());
    }

    #[test]
    fn test_pair_uniqueness() {
        let mut store = RowStore::new();
        let mut def = ModelDef::new("QuestionTag")
            .field(FieldDef::integer("question_id").not_null())
            .field(FieldDef::integer("tag_id").not_null());
        def.pair_unique = Some(("question_id".into(), "tag_id".into()));

        store
            .insert(&def, fields(json!({"question_id": 1, "tag_id": 1})))
            .unwrap();
        // Same question, different tag: allowed.
        store
            .insert(&def, fields(json!({"question_id": 1, "tag_id": 2})))
            .unwrap();
        let err = store
            .insert(&def, fields(json!({"question_id": 1, "tag_id": 1})))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePair { .. }));
    }

    #[test]
    fn test_scan_is_insertion_ordered() {
        let mut store = RowStore::new();
        let def = tag_model();
        for name in ["c", "a", "b"] {
            store.insert(&def, fields(json!({"tag_name": name}))).unwrap();
        }
        let names: Vec<&str> = store
            .scan("Tag")
            .iter()
            .map(|r| r.get("tag_name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_check_foreign_keys_against_live_pks() {
        use crate::schema::{AssociationKind, AssociationOptions};

        let mut registry = SchemaRegistry::new();
        registry
            .register_model(ModelDef::new("Question").field(FieldDef::string("title").not_null()))
            .unwrap();
        registry
            .register_model(ModelDef::new("Comment").field(FieldDef::text("body")))
            .unwrap();
        registry
            .register_association(
                "Question",
                "Comment",
                AssociationKind::OneToMany,
                AssociationOptions::named("Comments"),
            )
            .unwrap();

        let mut store = RowStore::new();
        let question_def = registry.model("Question").unwrap().clone();
        let question = store
            .insert(&question_def, fields(json!({"title": "Capital of France"})))
            .unwrap();

        // Null and absent keys pass; a live key passes.
        check_foreign_keys(&store, &registry, "Comment", &fields(json!({"body": "a"}))).unwrap();
        check_foreign_keys(
            &store,
            &registry,
            "Comment",
            &fields(json!({"body": "a", "question_id": null})),
        )
        .unwrap();
        check_foreign_keys(
            &store,
            &registry,
            "Comment",
            &fields(json!({"body": "a", "question_id": question.pk})),
        )
        .unwrap();

        let err = check_foreign_keys(
            &store,
            &registry,
            "Comment",
            &fields(json!({"body": "a", "question_id": 999})),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::DanglingReference { pk: 999, .. }));
    }

    #[test]
    fn test_reserved_pk_gap_survives_load() {
        let mut store = RowStore::new();
        let def = tag_model();

        let reserved = store.reserve_pk("Tag");
        assert_eq!(reserved, 1);
        // The reservation is never inserted; the next insert skips past it.
        let rec = store.insert(&def, fields(json!({"tag_name": "x"}))).unwrap();
        assert_eq!(rec.pk, 2);

        let rows = store.scan("Tag").to_vec();
        let mut restored = RowStore::new();
        restored.load("Tag", rows);
        assert_eq!(restored.reserve_pk("Tag"), 3);
    }
}
