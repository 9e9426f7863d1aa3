//! Result ordering
//!
//! Stable multi-key sort over records. Keys are precomputed so unknown
//! field references surface as errors before anything is reordered; ties
//! on every key keep the original scan order.

use std::cmp::Ordering;

use serde_json::Value;

use crate::schema::ModelDef;
use crate::store::Record;

use super::ast::{FnKind, OrderKey, OrderSpec, SortDirection};
use super::errors::{QueryError, QueryResult};
use super::filter::field_value;

/// Sorts records by an order specification
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts in place, stably, by each key in turn.
    pub fn sort(def: &ModelDef, records: &mut Vec<Record>, order: &[OrderSpec]) -> QueryResult<()> {
        if order.is_empty() {
            return Ok(());
        }

        let mut keyed: Vec<(Vec<Value>, Record)> = Vec::with_capacity(records.len());
        for record in records.drain(..) {
            let mut keys = Vec::with_capacity(order.len());
            for spec in order {
                keys.push(Self::key_value(def, &record, &spec.key)?);
            }
            keyed.push((keys, record));
        }

        keyed.sort_by(|(a_keys, _), (b_keys, _)| {
            for (i, spec) in order.iter().enumerate() {
                let ordering = compare_values(Some(&a_keys[i]), Some(&b_keys[i]));
                let ordering = match spec.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        records.extend(keyed.into_iter().map(|(_, record)| record));
        Ok(())
    }

    /// Evaluates one order key for one record
    fn key_value(def: &ModelDef, record: &Record, key: &OrderKey) -> QueryResult<Value> {
        match key {
            OrderKey::Column(column) => {
                Ok(field_value(def, record, column)?.unwrap_or(Value::Null))
            }
            OrderKey::Function(function, column) => {
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
}

/// Applies a scalar function to a value; null passes through.
pub fn apply_scalar(function: FnKind, value: &Value) -> Value {
    match (function, value) {
        (_, Value::Null) => Value::Null,
        (FnKind::Length, Value::String(s)) => Value::from(s.chars().count() as i64),
        (FnKind::Upper, Value::String(s)) => Value::from(s.to_uppercase()),
        // Non-string input to a string function passes through unchanged.
        (FnKind::Length | FnKind::Upper, other) => other.clone(),
        (FnKind::Count, other) => other.clone(),
    }
}

/// Total order over JSON values for sorting: null < bool < number <
/// string < array < object, natural order within a type.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_val), Some(b_val)) => {
            let type_order = |v: &Value| -> u8 {
                match v {
                    Value::Null => 0,
                    Value::Bool(_) => 1,
                    Value::Number(_) => 2,
                    Value::String(_) => 3,
                    Value::Array(_) => 4,
                    Value::Object(_) => 5,
                }
            };

            let a_type = type_order(a_val);
            let b_type = type_order(b_val);
            if a_type != b_type {
                return a_type.cmp(&b_type);
            }

            match (a_val, b_val) {
                (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
                (Value::Number(a_n), Value::Number(b_n)) => {
                    let a_f = a_n.as_f64().unwrap_or(0.0);
                    let b_f = b_n.as_f64().unwrap_or(0.0);
                    a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                }
                (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
                _ => Ordering::Equal,
            }
        }
    }
}
