//! Model and field definitions
//!
//! Supported field types:
//! - string: short UTF-8 string
//! - text: long UTF-8 string (same runtime representation as string)
//! - integer: 64-bit signed integer
//! - boolean: true/false
//!
//! A model is an ordered list of field definitions plus model-level
//! validation rules. Models are immutable once registered; the only
//! definition-time mutation is the registry implanting association
//! foreign-key fields.

use serde_json::Value;

use crate::validate::{FieldRule, ModelRule};

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Short UTF-8 string
    String,
    /// Long UTF-8 string
    Text,
    /// 64-bit signed integer
    Integer,
    /// Boolean
    Boolean,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
        }
    }

    /// Checks whether a JSON value inhabits this type.
    ///
    /// No coercion: the string "1" is not an integer, 1 is not a boolean.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String | FieldType::Text => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
        }
    }
}

/// A single field definition: name, type, constraints, validation rules.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field data type
    pub field_type: FieldType,
    /// Whether null / absent values are admitted
    pub allow_null: bool,
    /// Whether values must be unique within the model
    pub unique: bool,
    /// Field-level validation rules, run in declaration order
    pub rules: Vec<FieldRule>,
}

impl FieldDef {
    fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            allow_null: true,
            unique: false,
            rules: Vec::new(),
        }
    }

    /// Create a string field (nullable by default)
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Create a text field (nullable by default)
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// Create an integer field (nullable by default)
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    /// Create a boolean field (nullable by default)
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Forbid null / absent values
    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    /// Require values to be unique within the model
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Append a field-level validation rule
    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// A model definition: name, ordered fields, model-level rules.
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// Model name, unique within a registry
    pub name: String,
    /// Field definitions in declaration order
    pub fields: Vec<FieldDef>,
    /// Model-level validation rules, run after all field rules
    pub rules: Vec<ModelRule>,
    /// Composite uniqueness over a pair of fields (join models only)
    pub pair_unique: Option<(String, String)>,
}

impl ModelDef {
    /// Create an empty model definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            rules: Vec::new(),
            pair_unique: None,
        }
    }

    /// Append a field definition
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a model-level validation rule
    pub fn model_rule(mut self, rule: ModelRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Looks up a field definition by name
    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if the model declares the named field
    pub fn has_field(&self, name: &str) -> bool {
        self.field_def(name).is_some()
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}
