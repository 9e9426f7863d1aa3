//! Schema registry
//!
//! Holds every model definition and association declaration for one
//! database context. There is no process-wide default registry; callers
//! construct one (usually through `Database`) and pass it explicitly.
//!
//! Registering a one-to-one or one-to-many association implants the
//! foreign-key field into the target model. Registering a many-to-many
//! association synthesizes the join model on first sight of its name.

use std::collections::HashMap;

use super::association::{snake_case, AssociationDef, AssociationKind, AssociationOptions};
use super::errors::{SchemaError, SchemaResult};
use super::types::{FieldDef, FieldType, ModelDef};

/// Registry of model definitions and associations
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    models: HashMap<String, ModelDef>,
    associations: Vec<AssociationDef>,
}

impl SchemaRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model definition.
    ///
    /// # Errors
    ///
    /// - `TAB_DUPLICATE_MODEL` if the name is already registered
    /// - `TAB_INVALID_DEFINITION` for an empty model name or repeated
    ///   field names
    pub fn register_model(&mut self, model: ModelDef) -> SchemaResult<()> {
        if model.name.is_empty() {
            return Err(SchemaError::invalid_definition("model name must not be empty"));
        }
        if self.models.contains_key(&model.name) {
            return Err(SchemaError::duplicate_model(&model.name));
        }
        for (i, field) in model.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SchemaError::invalid_definition(format!(
                    "model '{}': field name must not be empty",
                    model.name
                )));
            }
            if model.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::invalid_definition(format!(
                    "model '{}': field '{}' declared twice",
                    model.name, field.name
                )));
            }
        }
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    /// Returns true if the model name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Looks up a model definition.
    ///
    /// # Errors
    ///
    /// `TAB_UNKNOWN_MODEL` if the name is not registered.
    pub fn model(&self, name: &str) -> SchemaResult<&ModelDef> {
        self.models
            .get(name)
            .ok_or_else(|| SchemaError::unknown_model(name))
    }

    /// Registers an association between two models.
    ///
    /// The association name defaults to the target model name. For
    /// one-to-one and one-to-many kinds the foreign-key field is implanted
    /// into the target model (nullable integer) unless already declared.
    /// For many-to-many the join model named in the kind is synthesized if
    /// missing, with a uniqueness invariant on the foreign-key pair.
    pub fn register_association(
        &mut self,
        source: &str,
        target: &str,
        kind: AssociationKind,
        options: AssociationOptions,
    ) -> SchemaResult<()> {
        if !self.contains(source) {
            return Err(SchemaError::unknown_model(source));
        }
        if !self.contains(target) {
            return Err(SchemaError::unknown_model(target));
        }

        let name = options.name.clone().unwrap_or_else(|| target.to_string());
        if self
            .associations
            .iter()
            .any(|a| a.source == source && a.name == name)
        {
            return Err(SchemaError::duplicate_association(source, name));
        }

        let def = match &kind {
            AssociationKind::OneToOne | AssociationKind::OneToMany => {
                let fk = options.foreign_key.unwrap_or_else(|| {
                    // Self-referencing aliases get their own column so two
                    // aliases on one model cannot collide.
                    if source == target && options.name.is_some() {
                        format!("{}_id", snake_case(&name))
                    } else {
                        format!("{}_id", snake_case(source))
                    }
                });
                self.implant_foreign_key(target, &fk)?;
                AssociationDef {
                    name,
                    source: source.to_string(),
                    target: target.to_string(),
                    kind,
                    foreign_key: fk,
                    target_key: None,
                }
            }
            AssociationKind::ManyToMany { through } => {
                let fk_source = options
                    .foreign_key
                    .unwrap_or_else(|| format!("{}_id", snake_case(source)));
                let fk_target = format!("{}_id", snake_case(target));
                self.ensure_join_model(through, &fk_source, &fk_target)?;
                AssociationDef {
                    name,
                    source: source.to_string(),
                    target: target.to_string(),
                    kind,
                    foreign_key: fk_source,
                    target_key: Some(fk_target),
                }
            }
        };

        self.associations.push(def);
        Ok(())
    }

    /// Looks up an association by source model and name.
    ///
    /// # Errors
    ///
    /// `TAB_UNKNOWN_ASSOCIATION` if no such declaration exists.
    pub fn association(&self, source: &str, name: &str) -> SchemaResult<&AssociationDef> {
        self.associations
            .iter()
            .find(|a| a.source == source && a.name == name)
            .ok_or_else(|| SchemaError::unknown_association(source, name))
    }

    /// All associations declared with the given source model
    pub fn associations_of(&self, source: &str) -> Vec<&AssociationDef> {
        self.associations
            .iter()
            .filter(|a| a.source == source)
            .collect()
    }

    /// Foreign-key fields carried by `model`, each paired with the model
    /// whose primary keys it references.
    ///
    /// One-to-* implants put the fk on the target model; a join model
    /// carries one fk per side. Both directions of a many-to-many declare
    /// the same join keys, so entries are deduplicated.
    pub fn foreign_keys_of(&self, model: &str) -> Vec<(String, String)> {
        let mut keys: Vec<(String, String)> = Vec::new();
        let push = |keys: &mut Vec<(String, String)>, field: &str, owner: &str| {
            let entry = (field.to_string(), owner.to_string());
            if !keys.contains(&entry) {
                keys.push(entry);
            }
        };
        for assoc in &self.associations {
            match &assoc.kind {
                AssociationKind::OneToOne | AssociationKind::OneToMany => {
                    if assoc.target == model {
                        push(&mut keys, &assoc.foreign_key, &assoc.source);
                    }
                }
                AssociationKind::ManyToMany { through } => {
                    if through == model {
                        push(&mut keys, &assoc.foreign_key, &assoc.source);
                        if let Some(target_key) = &assoc.target_key {
                            push(&mut keys, target_key, &assoc.target);
                        }
                    }
                }
            }
        }
        keys
    }

    /// Adds the fk field to the target model if absent; an existing field
    /// of a non-integer type is a definition conflict.
    fn implant_foreign_key(&mut self, target: &str, fk: &str) -> SchemaResult<()> {
        let model = self
            .models
            .get_mut(target)
            .ok_or_else(|| SchemaError::unknown_model(target))?;
        match model.field_def(fk) {
            Some(existing) if existing.field_type != FieldType::Integer => {
                Err(SchemaError::invalid_definition(format!(
                    "model '{}': foreign key '{}' conflicts with a declared {} field",
                    target,
                    fk,
                    existing.field_type.type_name()
                )))
            }
            Some(_) => Ok(()),
            None => {
                model.fields.push(FieldDef::integer(fk));
                Ok(())
            }
        }
    }

    /// Creates the join model if missing, or checks an existing one (for
    /// the reverse-direction declaration) carries both fk fields.
    fn ensure_join_model(
        &mut self,
        through: &str,
        fk_source: &str,
        fk_target: &str,
    ) -> SchemaResult<()> {
        if let Some(existing) = self.models.get(through) {
            if !existing.has_field(fk_source) || !existing.has_field(fk_target) {
                return Err(SchemaError::invalid_definition(format!(
                    "join model '{}' is missing foreign key '{}' or '{}'",
                    through, fk_source, fk_target
                )));
            }
            return Ok(());
        }

        let mut join = ModelDef::new(through)
            .field(FieldDef::integer(fk_source).not_null())
            .field(FieldDef::integer(fk_target).not_null());
        join.pair_unique = Some((fk_source.to_string(), fk_target.to_string()));
        self.register_model(join)
    }
}
