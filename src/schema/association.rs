//! Association declarations between models
//!
//! Three kinds are supported:
//! - one-to-one: the target model carries a nullable foreign key
//!   referencing the source primary key
//! - one-to-many: same foreign-key placement, many target rows may point
//!   at one source row
//! - many-to-many: a synthetic join model pairs a source and a target
//!   foreign key; the pair is unique

/// Relationship kind between two models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationKind {
    /// One source row links at most one target row
    OneToOne,
    /// One source row links any number of target rows
    OneToMany,
    /// Rows link through a synthetic join model of the given name
    ManyToMany {
        /// Join model name
        through: String,
    },
}

impl AssociationKind {
    /// Many-to-many through the named join model
    pub fn many_to_many(through: impl Into<String>) -> Self {
        AssociationKind::ManyToMany {
            through: through.into(),
        }
    }

    /// Returns the kind name for error messages and logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            AssociationKind::OneToOne => "one-to-one",
            AssociationKind::OneToMany => "one-to-many",
            AssociationKind::ManyToMany { .. } => "many-to-many",
        }
    }

    /// Returns true if resolution yields at most one record
    pub fn is_singular(&self) -> bool {
        matches!(self, AssociationKind::OneToOne)
    }
}

/// Declaration-time options for an association
#[derive(Debug, Clone, Default)]
pub struct AssociationOptions {
    /// Association name; defaults to the target model name
    pub name: Option<String>,
    /// Foreign-key field name; defaults to `<snake(source)>_id`
    pub foreign_key: Option<String>,
}

impl AssociationOptions {
    /// Name the association (the `as` alias)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            foreign_key: None,
        }
    }

    /// Override the foreign-key field name
    pub fn with_foreign_key(mut self, fk: impl Into<String>) -> Self {
        self.foreign_key = Some(fk.into());
        self
    }
}

/// A resolved association declaration
#[derive(Debug, Clone)]
pub struct AssociationDef {
    /// Association name, unique per source model
    pub name: String,
    /// Source model name
    pub source: String,
    /// Target model name
    pub target: String,
    /// Relationship kind
    pub kind: AssociationKind,
    /// For one-to-*: fk field on the target model referencing the source pk.
    /// For many-to-many: fk field on the join model referencing the source pk.
    pub foreign_key: String,
    /// For many-to-many only: fk field on the join model referencing the
    /// target pk
    pub target_key: Option<String>,
}

impl AssociationDef {
    /// Join model name for many-to-many associations
    pub fn through(&self) -> Option<&str> {
        match &self.kind {
            AssociationKind::ManyToMany { through } => Some(through),
            _ => None,
        }
    }
}

/// Lower-snake-cases a model name for foreign-key derivation
/// ("Question" -> "question", "QuestionTag" -> "question_tag").
pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
