//! Query execution
//!
//! Runs the full pipeline over a row snapshot: filter, order, group or
//! project, eager-load, limit. Execution is deterministic for a given
//! store state and never mutates anything.

use serde_json::{Map, Value};

use crate::assoc::AssociationResolver;
use crate::schema::{ModelDef, SchemaRegistry};
use crate::store::{Record, SnapshotRead};

use super::ast::{FnKind, QueryOptions, SelectExpr};
use super::errors::{QueryError, QueryResult};
use super::filter::{field_value, PredicateFilter, PK_FIELD};
use super::sorter::{apply_scalar, ResultSorter};

/// One output row.
///
/// Values keep projection order, which `serde_json::Map` would not.
/// Grouped and summary rows carry no primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Primary key of the backing record, absent for aggregate rows
    pub pk: Option<i64>,
    /// Projected columns in projection order
    pub values: Vec<(String, Value)>,
    /// Eager-loaded associations: name to object, null, or array
    pub included: Vec<(String, Value)>,
}

impl ResultRow {
    /// Looks up a projected column or an included association by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .chain(self.included.iter())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Flattens into a JSON object (key order is the map's, not the
    /// projection's)
    pub fn into_value(self) -> Value {
        let mut object = Map::new();
        for (name, value) in self.values.into_iter().chain(self.included) {
            object.insert(name, value);
        }
        Value::Object(object)
    }
}

/// Evaluates queries against a schema and a row snapshot
pub struct QueryEngine<'a> {
    registry: &'a SchemaRegistry,
    filter: PredicateFilter,
}

impl<'a> QueryEngine<'a> {
    /// Creates an engine over the given registry
    pub fn new(registry: &'a SchemaRegistry, like_case_insensitive: bool) -> Self {
        Self {
            registry,
            filter: PredicateFilter::new(like_case_insensitive),
        }
    }

    /// Runs a query and returns the output rows
    pub fn find<S: SnapshotRead>(
        &self,
        snapshot: &S,
        model: &str,
        options: &QueryOptions,
    ) -> QueryResult<Vec<ResultRow>> {
        let def = self.registry.model(model)?;
        let mut records = self.matching_records(snapshot, def, options)?;
        ResultSorter::sort(def, &mut records, &options.order)?;

        let mut rows = if !options.group.is_empty() {
            self.grouped_rows(def, &records, options)?
        } else if Self::wants_aggregate(options) {
            vec![self.summary_row(def, &records, options)?]
        } else {
            self.record_rows(snapshot, def, records, options)?
        };

        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    /// Runs a query and returns the first output row, if any
    pub fn find_one<S: SnapshotRead>(
        &self,
        snapshot: &S,
        model: &str,
        options: &QueryOptions,
    ) -> QueryResult<Option<ResultRow>> {
        let mut rows = self.find(snapshot, model, options)?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    /// Fetches a record by primary key
    pub fn find_by_pk<S: SnapshotRead>(
        &self,
        snapshot: &S,
        model: &str,
        pk: i64,
    ) -> QueryResult<Option<Record>> {
        self.registry.model(model)?;
        Ok(snapshot
            .model_rows(model)
            .into_iter()
            .find(|record| record.pk == pk))
    }

    /// Counts the records matching a filter
    pub fn count<S: SnapshotRead>(
        &self,
        snapshot: &S,
        model: &str,
        options: &QueryOptions,
    ) -> QueryResult<usize> {
        let def = self.registry.model(model)?;
        Ok(self.matching_records(snapshot, def, options)?.len())
    }

    fn matching_records<S: SnapshotRead>(
        &self,
        snapshot: &S,
        def: &ModelDef,
        options: &QueryOptions,
    ) -> QueryResult<Vec<Record>> {
        let mut records = Vec::new();
        for record in snapshot.model_rows(&def.name) {
            let keep = match &options.filter {
                Some(predicate) => self.filter.matches(def, &record, predicate)?,
                None => true,
            };
            if keep {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn wants_aggregate(options: &QueryOptions) -> bool {
        options
            .attributes
            .as_ref()
            .map(|attrs| attrs.iter().any(SelectExpr::is_aggregate))
            .unwrap_or(false)
    }

    /// Per-record output path: default or explicit projection, then
    /// eager loading.
    fn record_rows<S: SnapshotRead>(
        &self,
        snapshot: &S,
        def: &ModelDef,
        records: Vec<Record>,
        options: &QueryOptions,
    ) -> QueryResult<Vec<ResultRow>> {
        let resolver = AssociationResolver::new(self.registry);
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let values = match &options.attributes {
                None => Self::default_projection(def, &record),
                Some(attrs) => {
                    let mut values = Vec::with_capacity(attrs.len());
                    for attr in attrs {
                        values.push((
                            attr.output_name().to_string(),
                            self.project_row_expr(def, &record, attr)?,
                        ));
                    }
                    values
                }
            };

            let mut included = Vec::with_capacity(options.include.len());
            for name in &options.include {
                let assoc = self.registry.association(&def.name, name)?;
                let related = resolver.get_related(snapshot, &record, name)?;
                let value = if assoc.kind.is_singular() {
                    related.into_one().map(record_json).unwrap_or(Value::Null)
                } else {
                    Value::Array(related.into_many().into_iter().map(record_json).collect())
                };
                included.push((name.clone(), value));
            }

            rows.push(ResultRow {
                pk: Some(record.pk),
                values,
                included,
            });
        }
        Ok(rows)
    }

    /// `id` plus every declared field in declaration order, absent
    /// fields reading as null
    fn default_projection(def: &ModelDef, record: &Record) -> Vec<(String, Value)> {
        let mut values = Vec::with_capacity(def.fields.len() + 1);
        values.push((PK_FIELD.to_string(), Value::from(record.pk)));
        for field in &def.fields {
            values.push((
                field.name.clone(),
                record.get(&field.name).cloned().unwrap_or(Value::Null),
            ));
        }
        values
    }

    fn project_row_expr(
        &self,
        def: &ModelDef,
        record: &Record,
        expr: &SelectExpr,
    ) -> QueryResult<Value> {
        match expr {
            SelectExpr::Column(column) | SelectExpr::Aliased { column, .. } => {
                Ok(field_value(def, record, column)?.unwrap_or(Value::Null))
            }
            SelectExpr::Function { function, column, .. } => {
                if function.is_aggregate() {
                    return Err(QueryError::AggregateInRowContext {
                        function: function.fn_name().to_string(),
                    });
                }
                let value = field_value(def, record, column)?.unwrap_or(Value::Null);
                Ok(apply_scalar(*function, &value))
            }
        }
    }

    /// Grouped output path: partitions keep first-seen order over the
    /// (possibly sorted) scan.
    fn grouped_rows(
        &self,
        def: &ModelDef,
        records: &[Record],
        options: &QueryOptions,
    ) -> QueryResult<Vec<ResultRow>> {
        for field in &options.group {
            if field != PK_FIELD && !def.has_field(field) {
                return Err(QueryError::unknown_field(&def.name, field));
            }
        }

        let mut partitions: Vec<(Vec<Value>, Vec<&Record>)> = Vec::new();
        for record in records {
            let mut key = Vec::with_capacity(options.group.len());
            for field in &options.group {
                key.push(field_value(def, record, field)?.unwrap_or(Value::Null));
            }
            match partitions.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(record),
                None => partitions.push((key, vec![record])),
            }
        }

        // Without an explicit projection a grouped query yields its keys.
        let default_attrs: Vec<SelectExpr> = options
            .group
            .iter()
            .map(|field| SelectExpr::Column(field.clone()))
            .collect();
        let attrs = options.attributes.as_deref().unwrap_or(&default_attrs);

        let mut rows = Vec::with_capacity(partitions.len());
        for (_, members) in &partitions {
            let mut values = Vec::with_capacity(attrs.len());
            for attr in attrs {
                values.push((
                    attr.output_name().to_string(),
                    self.project_group_expr(def, members, attr)?,
                ));
            }
            rows.push(ResultRow {
                pk: None,
                values,
                included: Vec::new(),
            });
        }
        Ok(rows)
    }

    /// Aggregate-without-group output: one summary row over every match
    fn summary_row(
        &self,
        def: &ModelDef,
        records: &[Record],
        options: &QueryOptions,
    ) -> QueryResult<ResultRow> {
        let attrs = options
            .attributes
            .as_deref()
            .unwrap_or(&[]);
        let members: Vec<&Record> = records.iter().collect();
        let mut values = Vec::with_capacity(attrs.len());
        for attr in attrs {
            values.push((
                attr.output_name().to_string(),
                self.project_group_expr(def, &members, attr)?,
            ));
        }
        Ok(ResultRow {
            pk: None,
            values,
            included: Vec::new(),
        })
    }

    /// Evaluates one projection expression in aggregate context. Plain
    /// columns take the first member's value (null for an empty group).
    fn project_group_expr(
        &self,
        def: &ModelDef,
        members: &[&Record],
        expr: &SelectExpr,
    ) -> QueryResult<Value> {
        match expr {
            SelectExpr::Column(column) | SelectExpr::Aliased { column, .. } => {
                match members.first() {
                    Some(record) => {
                        Ok(field_value(def, record, column)?.unwrap_or(Value::Null))
                    }
                    None => Ok(Value::Null),
                }
            }
            SelectExpr::Function { function, column, .. } => match function {
                FnKind::Count => {
                    if column == "*" {
                        return Ok(Value::from(members.len() as i64));
                    }
                    let mut non_null = 0i64;
                    for record in members {
                        if field_value(def, record, column)?.is_some() {
                            non_null += 1;
                        }
                    }
                    Ok(Value::from(non_null))
                }
                _ => match members.first() {
                    Some(record) => {
                        let value =
                            field_value(def, record, column)?.unwrap_or(Value::Null);
                        Ok(apply_scalar(*function, &value))
                    }
                    None => Ok(Value::Null),
                },
            },
        }
    }
}

/// Serializes a record to its query-output object shape
fn record_json(record: Record) -> Value {
    let mut object = Map::new();
    object.insert(PK_FIELD.to_string(), Value::from(record.pk));
    for (name, value) in record.fields {
        object.insert(name, value);
    }
    Value::Object(object)
}
