//! Validation rules
//!
//! Field rules judge a single value; model rules see the whole candidate
//! field set and run after every field rule. Built-in field rules cover
//! the common cases; `Custom` wraps an arbitrary predicate plus message.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Predicate type for custom field rules
pub type FieldCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Predicate type for model-level rules
pub type ModelCheck = Arc<dyn Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync>;

/// A field-level validation rule
#[derive(Clone)]
pub enum FieldRule {
    /// Reject the empty string
    NotEmpty,
    /// String length must be within [min, max], inclusive
    Len {
        /// Minimum length
        min: usize,
        /// Maximum length
        max: usize,
    },
    /// Value must look like an email address (`local@domain.tld`)
    IsEmail,
    /// Value must be an integer (no coercion from strings or floats)
    IsInt,
    /// Integer value must be >= the bound
    Min(i64),
    /// Integer value must be <= the bound
    Max(i64),
    /// Arbitrary predicate; an `Err` message becomes the violation text
    Custom {
        /// Rule identifier used in violation reports
        name: String,
        /// The predicate itself
        check: FieldCheck,
    },
}

impl FieldRule {
    /// Length rule with inclusive bounds
    pub fn len(min: usize, max: usize) -> Self {
        FieldRule::Len { min, max }
    }

    /// Custom rule from a named predicate
    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        FieldRule::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Rule identifier used in violation reports
    pub fn rule_name(&self) -> &str {
        match self {
            FieldRule::NotEmpty => "not_empty",
            FieldRule::Len { .. } => "len",
            FieldRule::IsEmail => "is_email",
            FieldRule::IsInt => "is_int",
            FieldRule::Min(_) => "min",
            FieldRule::Max(_) => "max",
            FieldRule::Custom { name, .. } => name,
        }
    }

    /// Applies the rule to one value, returning the violation message on
    /// failure. String rules pass on non-string values and integer rules
    /// on non-integer values; the type check runs separately.
    pub fn apply(&self, value: &Value) -> Result<(), String> {
        match self {
            FieldRule::NotEmpty => match value.as_str() {
                Some(s) if s.is_empty() => Err("must not be empty".to_string()),
                _ => Ok(()),
            },
            FieldRule::Len { min, max } => match value.as_str() {
                Some(s) => {
                    let len = s.chars().count();
                    if len < *min || len > *max {
                        Err(format!("length must be between {} and {}", min, max))
                    } else {
                        Ok(())
                    }
                }
                None => Ok(()),
            },
            FieldRule::IsEmail => match value.as_str() {
                Some(s) if is_email(s) => Ok(()),
                Some(_) => Err("is not a valid email address".to_string()),
                None => Ok(()),
            },
            FieldRule::IsInt => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err("is not an integer".to_string())
                }
            }
            FieldRule::Min(bound) => match value.as_i64() {
                Some(n) if n >= *bound => Ok(()),
                Some(_) => Err(format!("must be at least {}", bound)),
                None => Err("is not an integer".to_string()),
            },
            FieldRule::Max(bound) => match value.as_i64() {
                Some(n) if n <= *bound => Ok(()),
                Some(_) => Err(format!("must be at most {}", bound)),
                None => Err("is not an integer".to_string()),
            },
            FieldRule::Custom { check, .. } => check(value),
        }
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRule::NotEmpty => write!(f, "NotEmpty"),
            FieldRule::Len { min, max } => write!(f, "Len[{}, {}]", min, max),
            FieldRule::IsEmail => write!(f, "IsEmail"),
            FieldRule::IsInt => write!(f, "IsInt"),
            FieldRule::Min(n) => write!(f, "Min({})", n),
            FieldRule::Max(n) => write!(f, "Max({})", n),
            FieldRule::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

/// A model-level validation rule over the whole candidate field set
#[derive(Clone)]
pub struct ModelRule {
    /// Rule identifier used in violation reports
    pub name: String,
    /// The predicate itself
    pub check: ModelCheck,
}

impl ModelRule {
    /// Model rule from a named predicate
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for ModelRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelRule({})", self.name)
    }
}

/// Minimal email shape check: non-empty local part, a domain segment
/// containing a dot with non-empty labels around it.
fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
