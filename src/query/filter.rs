//! Predicate evaluation
//!
//! Evaluates a predicate tree bottom-up against one record. A reference
//! to an undeclared field is an evaluation error; missing and null values
//! on declared fields compare as SQL-ish nulls (equal only to an explicit
//! null, never inside range comparisons). No type coercion anywhere.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::Value;

use crate::schema::ModelDef;
use crate::store::Record;

use super::ast::{CmpOp, Predicate};
use super::errors::{QueryError, QueryResult};
use super::sorter::compare_values;

/// Name under which the primary key is addressable in queries
pub const PK_FIELD: &str = "id";

/// Evaluates predicate trees against records
pub struct PredicateFilter {
    like_case_insensitive: bool,
}

impl PredicateFilter {
    /// Creates a filter with the configured default LIKE case behavior
    pub fn new(like_case_insensitive: bool) -> Self {
        Self {
            like_case_insensitive,
        }
    }

    /// Evaluates the tree to a boolean for one record
    pub fn matches(
        &self,
        def: &ModelDef,
        record: &Record,
        predicate: &Predicate,
    ) -> QueryResult<bool> {
        match predicate {
            Predicate::And(children) => {
                for child in children {
                    if !self.matches(def, record, child)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(children) => {
                for child in children {
                    if self.matches(def, record, child)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Cmp { field, op } => self.matches_cmp(def, record, field, op),
        }
    }

    fn matches_cmp(
        &self,
        def: &ModelDef,
        record: &Record,
        field: &str,
        op: &CmpOp,
    ) -> QueryResult<bool> {
        let actual = field_value(def, record, field)?;

        Ok(match op {
            CmpOp::Eq(expected) => match (&actual, expected) {
                (None, Value::Null) => true,
                (None, _) => false,
                (Some(a), e) => a == e,
            },
            CmpOp::Ne(expected) => match (&actual, expected) {
                (None, Value::Null) => false,
                (None, _) => true,
                (Some(a), e) => a != e,
            },
            CmpOp::Gt(bound) => ordered_cmp(actual.as_ref(), bound) == Some(Ordering::Greater),
            CmpOp::Gte(bound) => matches!(
                ordered_cmp(actual.as_ref(), bound),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            CmpOp::Lt(bound) => ordered_cmp(actual.as_ref(), bound) == Some(Ordering::Less),
            CmpOp::Lte(bound) => matches!(
                ordered_cmp(actual.as_ref(), bound),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            CmpOp::Like {
                pattern,
                case_insensitive,
            } => {
                let insensitive = case_insensitive.unwrap_or(self.like_case_insensitive);
                match actual.as_ref().and_then(|v| v.as_str()) {
                    Some(s) => like_match(pattern, s, insensitive)?,
                    None => false,
                }
            }
        })
    }
}

/// Resolves a field reference to the record's value.
///
/// `id` addresses the primary key. Unknown references are evaluation
/// errors; declared-but-absent and explicit-null both resolve to `None`.
pub fn field_value(
    def: &ModelDef,
    record: &Record,
    field: &str,
) -> QueryResult<Option<Value>> {
    if field == PK_FIELD {
        return Ok(Some(Value::from(record.pk)));
    }
    if !def.has_field(field) {
        return Err(QueryError::unknown_field(&def.name, field));
    }
    Ok(record.get_non_null(field).cloned())
}

/// Compares for range operators: null never matches, and only values of
/// the same type rank (no cross-type ordering inside predicates).
fn ordered_cmp(actual: Option<&Value>, bound: &Value) -> Option<Ordering> {
    let actual = actual?;
    let comparable = matches!(
        (actual, bound),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
    );
    if !comparable {
        return None;
    }
    Some(compare_values(Some(actual), Some(bound)))
}

/// SQL LIKE matching via an anchored regex: `%` becomes `.*`, `_`
/// becomes `.`, everything else is escaped literally.
fn like_match(pattern: &str, value: &str, case_insensitive: bool) -> QueryResult<bool> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    let regex = RegexBuilder::new(&format!("^{}$", translated))
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| QueryError::BadPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
    Ok(regex.is_match(value))
}
