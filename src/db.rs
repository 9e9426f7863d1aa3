//! Database facade
//!
//! The single entry point tying the subsystems together: schema
//! registration, validated mutations, queries, association traversal, and
//! transactions. Every mutation takes `&mut self`, which serializes
//! writers at the type level; reads never mutate.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::assoc::{AssocError, AssociationResolver, Related};
use crate::config::DatabaseConfig;
use crate::observe::Logger;
use crate::query::{
    Predicate, PredicateFilter, QueryEngine, QueryError, QueryOptions, ResultRow,
};
use crate::schema::{
    AssociationKind, AssociationOptions, ModelDef, SchemaError, SchemaRegistry,
};
use crate::store::{
    check_foreign_keys, PersistenceSink, Record, RowStore, SnapshotRead, StoreError,
};
use crate::txn::{PendingOp, TransactionLog, TxnError, TxnState};
use crate::validate::{ValidationError, Validator};

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Unified error surface of the facade
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Model or association definition problem
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Candidate field set rejected by the validator
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Row store rejection (missing record, uniqueness)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Query evaluation failure
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Association resolution failure
    #[error(transparent)]
    Assoc(#[from] AssocError),

    /// Transaction lifecycle or commit failure
    #[error(transparent)]
    Txn(#[from] TxnError),

    /// Persistence sink I/O failure
    #[error("persistence failure: {0}")]
    Persist(#[from] std::io::Error),
}

impl DbError {
    /// Stable string code for programmatic matching
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Schema(e) => e.code().code(),
            DbError::Validation(_) => "TAB_VALIDATION_FAILED",
            DbError::Store(StoreError::NotFound { .. }) => "TAB_NOT_FOUND",
            DbError::Store(StoreError::DanglingReference { .. }) => "TAB_FOREIGN_KEY_VIOLATION",
            DbError::Store(_) => "TAB_UNIQUENESS_VIOLATION",
            DbError::Query(_) => "TAB_EVALUATION_ERROR",
            DbError::Assoc(AssocError::Schema(e)) => e.code().code(),
            DbError::Assoc(AssocError::Store(StoreError::NotFound { .. })) => "TAB_NOT_FOUND",
            DbError::Assoc(AssocError::Store(_)) => "TAB_UNIQUENESS_VIOLATION",
            DbError::Txn(TxnError::Aborted { .. }) => "TAB_TRANSACTION_ROLLED_BACK",
            DbError::Txn(TxnError::Schema(e)) => e.code().code(),
            DbError::Txn(_) => "TAB_TRANSACTION_CLOSED",
            DbError::Persist(_) => "TAB_PERSISTENCE",
        }
    }
}

/// An embeddable in-memory relational evaluator
#[derive(Default)]
pub struct Database {
    config: DatabaseConfig,
    registry: SchemaRegistry,
    store: RowStore,
    txns: TransactionLog,
    sink: Option<Box<dyn PersistenceSink>>,
}

impl Database {
    /// Creates a database with the default configuration
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default())
    }

    /// Creates a database with an explicit configuration
    pub fn with_config(config: DatabaseConfig) -> Self {
        Self {
            config,
            registry: SchemaRegistry::new(),
            store: RowStore::new(),
            txns: TransactionLog::new(),
            sink: None,
        }
    }

    /// Attaches a persistence sink; committed writes flow into it
    pub fn attach_sink(&mut self, sink: Box<dyn PersistenceSink>) {
        self.sink = Some(sink);
    }

    /// Hydrates one model's rows from the attached sink.
    ///
    /// Returns the number of restored records; without a sink this is a
    /// no-op.
    pub fn load_model(&mut self, model: &str) -> DbResult<usize> {
        self.registry.model(model)?;
        let rows = match &mut self.sink {
            Some(sink) => sink.read(model)?,
            None => return Ok(0),
        };
        let count = rows.len();
        self.store.load(model, rows);
        Ok(count)
    }

    /// Registers a model definition
    pub fn define_model(&mut self, def: ModelDef) -> DbResult<()> {
        let name = def.name.clone();
        self.registry.register_model(def)?;
        self.event("model_defined", &[("model", &name)]);
        Ok(())
    }

    /// Declares an association between two registered models
    pub fn define_association(
        &mut self,
        source: &str,
        target: &str,
        kind: AssociationKind,
        options: AssociationOptions,
    ) -> DbResult<()> {
        let kind_name = kind.kind_name();
        self.registry
            .register_association(source, target, kind, options)?;
        self.event(
            "association_defined",
            &[("kind", kind_name), ("source", source), ("target", target)],
        );
        Ok(())
    }

    /// Read access to the registered definitions
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Validates and inserts a record
    pub fn create(&mut self, model: &str, fields: Map<String, Value>) -> DbResult<Record> {
        let def = self.registry.model(model)?.clone();
        Validator::check(&def, &fields)?;
        check_foreign_keys(&self.store, &self.registry, model, &fields)?;
        let record = self.store.insert(&def, fields)?;
        self.persist(&record)?;
        self.event(
            "record_created",
            &[("model", model), ("pk", &record.pk.to_string())],
        );
        Ok(record)
    }

    /// Validates and inserts a batch as one atomic unit: either every
    /// record lands or none does.
    pub fn bulk_create(
        &mut self,
        model: &str,
        batch: Vec<Map<String, Value>>,
    ) -> DbResult<Vec<Record>> {
        let def = self.registry.model(model)?.clone();
        for fields in &batch {
            Validator::check(&def, fields)?;
        }

        let mut staged = self.store.clone();
        let mut records = Vec::with_capacity(batch.len());
        for fields in batch {
            // Checked against the staged store so earlier batch entries
            // count as live referents.
            check_foreign_keys(&staged, &self.registry, model, &fields)?;
            records.push(staged.insert(&def, fields)?);
        }
        self.store = staged;

        for record in &records {
            self.persist(record)?;
        }
        self.event(
            "records_created",
            &[("count", &records.len().to_string()), ("model", model)],
        );
        Ok(records)
    }

    /// Validates and merges a change set into an existing record
    pub fn update(
        &mut self,
        model: &str,
        pk: i64,
        changes: Map<String, Value>,
    ) -> DbResult<Record> {
        let def = self.registry.model(model)?.clone();
        // The rules see the record as it would look after the merge.
        let mut merged = self.store.get(model, pk)?.fields.clone();
        for (key, value) in &changes {
            merged.insert(key.clone(), value.clone());
        }
        Validator::check(&def, &merged)?;
        check_foreign_keys(&self.store, &self.registry, model, &changes)?;

        let record = self.store.update(&def, pk, &changes)?;
        self.persist(&record)?;
        self.event(
            "record_updated",
            &[("model", model), ("pk", &pk.to_string())],
        );
        Ok(record)
    }

    /// Deletes every record matching the predicate; `None` clears the
    /// whole table. Returns the number of destroyed records.
    pub fn destroy(&mut self, model: &str, filter: Option<&Predicate>) -> DbResult<usize> {
        let def = self.registry.model(model)?.clone();
        let matcher = PredicateFilter::new(self.config.like_case_insensitive);

        let mut doomed = Vec::new();
        for record in self.store.scan(model) {
            let hit = match filter {
                Some(predicate) => matcher.matches(&def, record, predicate)?,
                None => true,
            };
            if hit {
                doomed.push(record.pk);
            }
        }
        for pk in &doomed {
            self.store.delete(model, *pk)?;
        }
        self.event(
            "records_destroyed",
            &[("count", &doomed.len().to_string()), ("model", model)],
        );
        Ok(doomed.len())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Runs a query over committed rows
    pub fn find(&self, model: &str, options: &QueryOptions) -> DbResult<Vec<ResultRow>> {
        Ok(self.engine().find(&self.store, model, options)?)
    }

    /// Every record of a model under the default projection
    pub fn find_all(&self, model: &str) -> DbResult<Vec<ResultRow>> {
        self.find(model, &QueryOptions::new())
    }

    /// First matching row, if any
    pub fn find_one(&self, model: &str, options: &QueryOptions) -> DbResult<Option<ResultRow>> {
        Ok(self.engine().find_one(&self.store, model, options)?)
    }

    /// Record by primary key
    pub fn find_by_pk(&self, model: &str, pk: i64) -> DbResult<Option<Record>> {
        Ok(self.engine().find_by_pk(&self.store, model, pk)?)
    }

    /// Number of records matching the options' filter
    pub fn count(&self, model: &str, options: &QueryOptions) -> DbResult<usize> {
        Ok(self.engine().count(&self.store, model, options)?)
    }

    /// Returns the first record whose fields equal the search set, or
    /// creates one from the search set merged over `defaults`. The
    /// boolean is true when a record was created; on a find, `defaults`
    /// is ignored.
    pub fn find_or_create(
        &mut self,
        model: &str,
        search: Map<String, Value>,
        defaults: Map<String, Value>,
    ) -> DbResult<(Record, bool)> {
        let predicate = Predicate::from_object(&search);
        let existing = {
            let def = self.registry.model(model)?;
            let matcher = PredicateFilter::new(self.config.like_case_insensitive);
            let mut found = None;
            for record in self.store.scan(model) {
                if matcher.matches(def, record, &predicate)? {
                    found = Some(record.clone());
                    break;
                }
            }
            found
        };
        match existing {
            Some(record) => Ok((record, false)),
            None => {
                let mut fields = defaults;
                for (key, value) in search {
                    fields.insert(key, value);
                }
                Ok((self.create(model, fields)?, true))
            }
        }
    }

    // ------------------------------------------------------------------
    // Associations
    // ------------------------------------------------------------------

    /// Records linked to `source` through the named association
    pub fn get_related(&self, source: &Record, name: &str) -> DbResult<Related> {
        let resolver = AssociationResolver::new(&self.registry);
        Ok(resolver.get_related(&self.store, source, name)?)
    }

    /// Points a one-to-one association at a target, replacing any
    /// previous link
    pub fn set_related(&mut self, source: &Record, name: &str, target_pk: i64) -> DbResult<Record> {
        let resolver = AssociationResolver::new(&self.registry);
        let updated = resolver.set_related(&mut self.store, source, name, target_pk)?;
        self.persist(&updated)?;
        self.event(
            "association_linked",
            &[
                ("association", name),
                ("source_pk", &source.pk.to_string()),
                ("target_pk", &target_pk.to_string()),
            ],
        );
        Ok(updated)
    }

    /// Adds a target to a plural association
    pub fn add_related(&mut self, source: &Record, name: &str, target_pk: i64) -> DbResult<Record> {
        let resolver = AssociationResolver::new(&self.registry);
        let touched = resolver.add_related(&mut self.store, source, name, target_pk)?;
        self.persist(&touched)?;
        self.event(
            "association_linked",
            &[
                ("association", name),
                ("source_pk", &source.pk.to_string()),
                ("target_pk", &target_pk.to_string()),
            ],
        );
        Ok(touched)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Opens a transaction
    pub fn begin(&mut self) -> Uuid {
        let id = self.txns.begin();
        self.event("transaction_started", &[("txn", &id.to_string())]);
        id
    }

    /// Applies a transaction's buffered operations atomically.
    ///
    /// A failed commit rolls the whole transaction back and surfaces the
    /// first violation; the store is left untouched.
    pub fn commit(&mut self, tx: Uuid) -> DbResult<()> {
        let ops = self.txns.ops(tx)?.to_vec();
        self.txns.commit(tx, &self.registry, &mut self.store)?;

        for op in &ops {
            match op {
                PendingOp::Insert { model, pk, .. } | PendingOp::Update { model, pk, .. } => {
                    if let Ok(record) = self.store.get(model, *pk) {
                        let record = record.clone();
                        self.persist(&record)?;
                    }
                }
                PendingOp::Delete { .. } => {}
            }
        }
        self.event("transaction_committed", &[("txn", &tx.to_string())]);
        Ok(())
    }

    /// Discards a transaction's buffered operations
    pub fn rollback(&mut self, tx: Uuid) -> DbResult<()> {
        self.txns.rollback(tx)?;
        self.event("transaction_rolled_back", &[("txn", &tx.to_string())]);
        Ok(())
    }

    /// Lifecycle state of a transaction
    pub fn transaction_state(&self, tx: Uuid) -> DbResult<TxnState> {
        Ok(self.txns.state(tx)?)
    }

    /// Runs a closure inside a managed transaction: commit on `Ok`,
    /// rollback on `Err`.
    pub fn with_transaction<T, F>(&mut self, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut Self, Uuid) -> DbResult<T>,
    {
        let tx = self.begin();
        match f(self, tx) {
            Ok(value) => {
                self.commit(tx)?;
                Ok(value)
            }
            Err(err) => {
                // Best effort; the closure may have closed it already.
                let _ = self.txns.rollback(tx);
                Err(err)
            }
        }
    }

    /// Validates and buffers an insert inside a transaction.
    ///
    /// The returned record carries its reserved primary key; it becomes
    /// visible to other readers only at commit.
    pub fn create_in(
        &mut self,
        tx: Uuid,
        model: &str,
        fields: Map<String, Value>,
    ) -> DbResult<Record> {
        let def = self.registry.model(model)?.clone();
        Validator::check(&def, &fields)?;
        // The view rejects closed and unknown transactions; checking
        // through it lets a buffered row serve as a referent.
        let view = self.txns.view(tx, &self.store)?;
        check_foreign_keys(&view, &self.registry, model, &fields)?;

        let pk = self.store.reserve_pk(model);
        let record = Record::new(model, pk, fields.clone());
        self.txns.buffer(
            tx,
            PendingOp::Insert {
                model: model.to_string(),
                pk,
                fields,
            },
        )?;
        Ok(record)
    }

    /// Validates and buffers an update inside a transaction
    pub fn update_in(
        &mut self,
        tx: Uuid,
        model: &str,
        pk: i64,
        changes: Map<String, Value>,
    ) -> DbResult<Record> {
        let def = self.registry.model(model)?.clone();
        let view = self.txns.view(tx, &self.store)?;
        let mut current = view
            .model_rows(model)
            .into_iter()
            .find(|r| r.pk == pk)
            .ok_or_else(|| StoreError::not_found(model, pk))?;

        let mut merged = current.fields.clone();
        for (key, value) in &changes {
            merged.insert(key.clone(), value.clone());
        }
        Validator::check(&def, &merged)?;
        check_foreign_keys(&view, &self.registry, model, &changes)?;

        current.fields = merged;
        self.txns.buffer(
            tx,
            PendingOp::Update {
                model: model.to_string(),
                pk,
                changes,
            },
        )?;
        Ok(current)
    }

    /// Buffers a delete inside a transaction
    pub fn destroy_in(&mut self, tx: Uuid, model: &str, pk: i64) -> DbResult<()> {
        self.registry.model(model)?;
        let view = self.txns.view(tx, &self.store)?;
        if !view.model_rows(model).iter().any(|r| r.pk == pk) {
            return Err(StoreError::not_found(model, pk).into());
        }
        self.txns.buffer(
            tx,
            PendingOp::Delete {
                model: model.to_string(),
                pk,
            },
        )?;
        Ok(())
    }

    /// Runs a query through a transaction's read-your-writes view
    pub fn find_in(
        &self,
        tx: Uuid,
        model: &str,
        options: &QueryOptions,
    ) -> DbResult<Vec<ResultRow>> {
        let view = self.txns.view(tx, &self.store)?;
        Ok(self.engine().find(&view, model, options)?)
    }

    /// Record by primary key through a transaction's view
    pub fn find_by_pk_in(&self, tx: Uuid, model: &str, pk: i64) -> DbResult<Option<Record>> {
        let view = self.txns.view(tx, &self.store)?;
        Ok(self.engine().find_by_pk(&view, model, pk)?)
    }

    /// Association resolution through a transaction's view
    pub fn get_related_in(&self, tx: Uuid, source: &Record, name: &str) -> DbResult<Related> {
        let view = self.txns.view(tx, &self.store)?;
        let resolver = AssociationResolver::new(&self.registry);
        Ok(resolver.get_related(&view, source, name)?)
    }

    // ------------------------------------------------------------------

    fn engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.registry, self.config.like_case_insensitive)
    }

    fn persist(&mut self, record: &Record) -> DbResult<()> {
        if let Some(sink) = &mut self.sink {
            sink.write(&record.model, record)?;
        }
        Ok(())
    }

    fn event(&self, name: &str, fields: &[(&str, &str)]) {
        if self.config.log_events {
            Logger::info(name, fields);
        }
    }
}
