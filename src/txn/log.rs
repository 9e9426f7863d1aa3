//! Transaction log
//!
//! Buffers validated mutations per transaction and applies them at commit
//! as one atomic unit: either every buffered operation lands in the row
//! store or none does. Open transactions read their own writes through an
//! overlay view; nothing buffered is visible outside the transaction
//! before commit.

use std::collections::HashMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::schema::SchemaRegistry;
use crate::store::{check_foreign_keys, Record, RowStore, SnapshotRead};

use super::errors::{TxnError, TxnResult};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Accepting buffered operations
    Open,
    /// Applied to the store; terminal
    Committed,
    /// Discarded, whether by the caller or by a failed commit; terminal
    RolledBack,
}

impl TxnState {
    /// Returns the state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnState::Open => "open",
            TxnState::Committed => "committed",
            TxnState::RolledBack => "rolled back",
        }
    }
}

/// One buffered mutation, validated before it was accepted
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    /// Insert under a primary key reserved at buffer time
    Insert {
        /// Target model
        model: String,
        /// Reserved primary key
        pk: i64,
        /// Validated field set
        fields: Map<String, Value>,
    },
    /// Merge a change set into an existing or buffered record
    Update {
        /// Target model
        model: String,
        /// Primary key
        pk: i64,
        /// Validated change set
        changes: Map<String, Value>,
    },
    /// Remove a record
    Delete {
        /// Target model
        model: String,
        /// Primary key
        pk: i64,
    },
}

impl PendingOp {
    /// Model this operation touches
    pub fn model(&self) -> &str {
        match self {
            PendingOp::Insert { model, .. }
            | PendingOp::Update { model, .. }
            | PendingOp::Delete { model, .. } => model,
        }
    }
}

#[derive(Debug)]
struct Transaction {
    state: TxnState,
    ops: Vec<PendingOp>,
}

/// Issues transaction ids and tracks buffered operations until commit or
/// rollback. Terminal transactions are kept so their state stays
/// queryable.
#[derive(Debug, Default)]
pub struct TransactionLog {
    txns: HashMap<Uuid, Transaction>,
}

impl TransactionLog {
    /// Creates an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction and returns its id
    pub fn begin(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.txns.insert(
            id,
            Transaction {
                state: TxnState::Open,
                ops: Vec::new(),
            },
        );
        id
    }

    /// Current state of a transaction
    pub fn state(&self, id: Uuid) -> TxnResult<TxnState> {
        self.txns
            .get(&id)
            .map(|t| t.state)
            .ok_or(TxnError::UnknownTransaction { id })
    }

    /// Appends a validated operation to an open transaction's buffer
    pub fn buffer(&mut self, id: Uuid, op: PendingOp) -> TxnResult<()> {
        self.open_mut(id)?.ops.push(op);
        Ok(())
    }

    /// Buffered operations of a transaction, in buffer order
    pub fn ops(&self, id: Uuid) -> TxnResult<&[PendingOp]> {
        self.txns
            .get(&id)
            .map(|t| t.ops.as_slice())
            .ok_or(TxnError::UnknownTransaction { id })
    }

    /// Read-your-writes view layering the transaction's buffer over the
    /// committed store.
    pub fn view<'a>(&'a self, id: Uuid, base: &'a RowStore) -> TxnResult<TxnView<'a>> {
        let ops = match self.txns.get(&id) {
            Some(txn) if txn.state == TxnState::Open => txn.ops.as_slice(),
            Some(txn) => {
                return Err(TxnError::Closed {
                    id,
                    state: txn.state.as_str(),
                })
            }
            None => return Err(TxnError::UnknownTransaction { id }),
        };
        Ok(TxnView { base, ops })
    }

    /// Applies every buffered operation in order.
    ///
    /// Operations are staged against a copy of the store; the first
    /// violation aborts the whole transaction, leaving the store exactly
    /// as it was and the transaction rolled back.
    pub fn commit(
        &mut self,
        id: Uuid,
        registry: &SchemaRegistry,
        store: &mut RowStore,
    ) -> TxnResult<()> {
        self.open_mut(id)?;

        let mut staged = store.clone();
        let ops = self.txns[&id].ops.clone();
        for op in &ops {
            let result = match op {
                PendingOp::Insert { model, pk, fields } => registry
                    .model(model)
                    .map_err(TxnError::from)
                    .and_then(|def| {
                        staged
                            .insert_with_pk(def, *pk, fields.clone())
                            .map_err(|source| TxnError::Aborted { source })
                    }),
                PendingOp::Update { model, pk, changes } => registry
                    .model(model)
                    .map_err(TxnError::from)
                    .and_then(|def| {
                        staged
                            .update(def, *pk, changes)
                            .map_err(|source| TxnError::Aborted { source })
                    }),
                PendingOp::Delete { model, pk } => staged
                    .delete(model, *pk)
                    .map_err(|source| TxnError::Aborted { source }),
            };
            if let Err(err) = result {
                self.close(id, TxnState::RolledBack);
                return Err(err);
            }
        }

        // Re-check every touched row's foreign keys against the fully
        // staged state; a referent destroyed since buffer time (or by a
        // later operation in this buffer) aborts the commit.
        for op in &ops {
            let (model, pk) = match op {
                PendingOp::Insert { model, pk, .. } | PendingOp::Update { model, pk, .. } => {
                    (model.as_str(), *pk)
                }
                PendingOp::Delete { .. } => continue,
            };
            let fields = match staged.get(model, pk) {
                Ok(record) => record.fields.clone(),
                Err(_) => continue,
            };
            if let Err(source) = check_foreign_keys(&staged, registry, model, &fields) {
                self.close(id, TxnState::RolledBack);
                return Err(TxnError::Aborted { source });
            }
        }

        *store = staged;
        self.close(id, TxnState::Committed);
        Ok(())
    }

    /// Discards an open transaction's buffer
    pub fn rollback(&mut self, id: Uuid) -> TxnResult<()> {
        self.open_mut(id)?;
        self.close(id, TxnState::RolledBack);
        Ok(())
    }

    fn open_mut(&mut self, id: Uuid) -> TxnResult<&mut Transaction> {
        let txn = self
            .txns
            .get_mut(&id)
            .ok_or(TxnError::UnknownTransaction { id })?;
        if txn.state != TxnState::Open {
            return Err(TxnError::Closed {
                id,
                state: txn.state.as_str(),
            });
        }
        Ok(txn)
    }

    fn close(&mut self, id: Uuid, state: TxnState) {
        if let Some(txn) = self.txns.get_mut(&id) {
            txn.state = state;
            txn.ops.clear();
        }
    }
}

/// Snapshot layering a transaction's pending operations over the
/// committed store, in buffer order.
pub struct TxnView<'a> {
    base: &'a RowStore,
    ops: &'a [PendingOp],
}

impl SnapshotRead for TxnView<'_> {
    fn model_rows(&self, model: &str) -> Vec<Record> {
        let mut rows = self.base.model_rows(model);
        for op in self.ops {
            if op.model() != model {
                continue;
            }
            match op {
                PendingOp::Insert { pk, fields, .. } => {
                    rows.push(Record::new(model, *pk, fields.clone()));
                }
                PendingOp::Update { pk, changes, .. } => {
                    if let Some(row) = rows.iter_mut().find(|r| r.pk == *pk) {
                        row.apply_changes(changes);
                    }
                }
                PendingOp::Delete { pk, .. } => {
                    rows.retain(|r| r.pk != *pk);
                }
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, ModelDef};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register_model(
                ModelDef::new("Tag").field(FieldDef::string("tag_name").not_null().unique()),
            )
            .unwrap();
        registry
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_buffered_insert_invisible_until_commit() {
        let registry = registry();
        let mut store = RowStore::new();
        let mut log = TransactionLog::new();

        let tx = log.begin();
        let pk = store.reserve_pk("Tag");
        log.buffer(
            tx,
            PendingOp::Insert {
                model: "Tag".into(),
                pk,
                fields: fields(json!({"tag_name": "Geography"})),
            },
        )
        .unwrap();

        assert!(store.is_empty("Tag"));
        // The transaction sees its own write.
        let view = log.view(tx, &store).unwrap();
        assert_eq!(view.model_rows("Tag").len(), 1);

        log.commit(tx, &registry, &mut store).unwrap();
        assert_eq!(store.len("Tag"), 1);
        assert_eq!(store.get("Tag", pk).unwrap().get("tag_name"), Some(&json!("Geography")));
        assert_eq!(log.state(tx).unwrap(), TxnState::Committed);
    }

    #[test]
    fn test_rollback_discards_buffer() {
        let registry = registry();
        let mut store = RowStore::new();
        let mut log = TransactionLog::new();

        let tx = log.begin();
        let pk = store.reserve_pk("Tag");
        log.buffer(
            tx,
            PendingOp::Insert {
                model: "Tag".into(),
                pk,
                fields: fields(json!({"tag_name": "Geography"})),
            },
        )
        .unwrap();
        log.rollback(tx).unwrap();

        assert!(store.is_empty("Tag"));
        assert_eq!(log.state(tx).unwrap(), TxnState::RolledBack);
        // The reserved pk is burned, never reused.
        let def = registry.model("Tag").unwrap().clone();
        let next = store.insert(&def, fields(json!({"tag_name": "History"}))).unwrap();
        assert_eq!(next.pk, pk + 1);
    }

    #[test]
    fn test_failed_commit_applies_nothing() {
        let registry = registry();
        let mut store = RowStore::new();
        let mut log = TransactionLog::new();

        let def = registry.model("Tag").unwrap().clone();
        store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();

        let tx = log.begin();
        for name in ["History", "Geography"] {
            let pk = store.reserve_pk("Tag");
            log.buffer(
                tx,
                PendingOp::Insert {
                    model: "Tag".into(),
                    pk,
                    fields: fields(json!({"tag_name": name})),
                },
            )
            .unwrap();
        }

        // The second insert collides with committed state; the valid first
        // insert must not land either.
        let err = log.commit(tx, &registry, &mut store).unwrap_err();
        assert!(matches!(err, TxnError::Aborted { .. }));
        assert_eq!(store.len("Tag"), 1);
        assert_eq!(log.state(tx).unwrap(), TxnState::RolledBack);
    }

    #[test]
    fn test_commit_aborts_on_referent_destroyed_after_buffering() {
        use crate::schema::{AssociationKind, AssociationOptions};
        use crate::store::StoreError;

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

        let mut log = TransactionLog::new();
        let tx = log.begin();
        let pk = store.reserve_pk("Comment");
        log.buffer(
            tx,
            PendingOp::Insert {
                model: "Comment".into(),
                pk,
                fields: fields(json!({"body": "nice", "question_id": question.pk})),
            },
        )
        .unwrap();

        // The referent disappears between buffering and commit.
        store.delete("Question", question.pk).unwrap();

        let err = log.commit(tx, &registry, &mut store).unwrap_err();
        assert!(matches!(
            err,
            TxnError::Aborted {
                source: StoreError::DanglingReference { .. }
            }
        ));
        assert!(store.is_empty("Comment"));
        assert_eq!(log.state(tx).unwrap(), TxnState::RolledBack);
    }

    #[test]
    fn test_terminal_transaction_rejects_operations() {
        let registry = registry();
        let mut store = RowStore::new();
        let mut log = TransactionLog::new();

        let tx = log.begin();
        log.commit(tx, &registry, &mut store).unwrap();

        let err = log
            .buffer(
                tx,
                PendingOp::Delete {
                    model: "Tag".into(),
                    pk: 1,
                },
            )
            .unwrap_err();
        assert!(matches!(err, TxnError::Closed { state: "committed", .. }));
        assert!(matches!(log.rollback(tx).unwrap_err(), TxnError::Closed { .. }));
        assert!(matches!(
            log.commit(tx, &registry, &mut store).unwrap_err(),
            TxnError::Closed { .. }
        ));
    }

    #[test]
    fn test_unknown_transaction() {
        let mut log = TransactionLog::new();
        let err = log.rollback(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, TxnError::UnknownTransaction { .. }));
    }

    #[test]
    fn test_view_layers_update_and_delete() {
        let registry = registry();
        let mut store = RowStore::new();
        let mut log = TransactionLog::new();
        let def = registry.model("Tag").unwrap().clone();
        let a = store.insert(&def, fields(json!({"tag_name": "Geography"}))).unwrap();
        let b = store.insert(&def, fields(json!({"tag_name": "History"}))).unwrap();

        let tx = log.begin();
        log.buffer(
            tx,
            PendingOp::Update {
                model: "Tag".into(),
                pk: a.pk,
                changes: fields(json!({"tag_name": "Maps"})),
            },
        )
        .unwrap();
        log.buffer(
            tx,
            PendingOp::Delete {
                model: "Tag".into(),
                pk: b.pk,
            },
        )
        .unwrap();

        let rows = log.view(tx, &store).unwrap().model_rows("Tag");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("tag_name"), Some(&json!("Maps")));

        // The committed store is untouched until commit.
        assert_eq!(store.get("Tag", a.pk).unwrap().get("tag_name"), Some(&json!("Geography")));
        assert!(store.contains("Tag", b.pk));
    }
}
