//! Record validator
//!
//! Validates a candidate field set against a model definition before any
//! store mutation. Unlike a fail-fast checker, every rule runs and every
//! violation is collected: short-circuiting happens only inside a single
//! rule, never across rules.
//!
//! Check order per field: declared-field check, null check, exact type
//! check, then the field's rules in declaration order. Model-level rules
//! run last with the full candidate field set.

use serde_json::{Map, Value};

use crate::schema::ModelDef;

use super::errors::{ValidationError, ValidationResult, Violation};

/// Stateless validator over model definitions
pub struct Validator;

impl Validator {
    /// Collects every violation for the candidate field set.
    ///
    /// An empty result means the candidate is admissible. Uniqueness is a
    /// store concern and is not checked here.
    pub fn validate(model: &ModelDef, fields: &Map<String, Value>) -> Vec<Violation> {
        let mut violations = Vec::new();

        // Undeclared keys are rejected, not silently accepted.
        for key in fields.keys() {
            if !model.has_field(key) {
                violations.push(Violation::field(
                    key,
                    "unknown_field",
                    format!("is not declared on model '{}'", model.name),
                ));
            }
        }

        for field in &model.fields {
            let value = fields.get(&field.name).filter(|v| !v.is_null());

            let value = match value {
                Some(v) => v,
                None => {
                    if !field.allow_null {
                        violations.push(Violation::field(
                            &field.name,
                            "not_null",
                            "cannot be null",
                        ));
                    }
                    continue;
                }
            };

            if !field.field_type.accepts(value) {
                violations.push(Violation::field(
                    &field.name,
                    "type",
                    format!("expected {}", field.field_type.type_name()),
                ));
                // Rules assume a well-typed value.
                continue;
            }

            for rule in &field.rules {
                if let Err(message) = rule.apply(value) {
                    violations.push(Violation::field(&field.name, rule.rule_name(), message));
                }
            }
        }

        for rule in &model.rules {
            if let Err(message) = (rule.check)(fields) {
                violations.push(Violation::model(&rule.name, message));
            }
        }

        violations
    }

    /// Like [`Validator::validate`], but packaged as a `Result`.
    pub fn check(model: &ModelDef, fields: &Map<String, Value>) -> ValidationResult<()> {
        let violations = Self::validate(model, fields);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(&model.name, violations))
        }
    }
}
