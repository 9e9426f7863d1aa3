//! Query option structures
//!
//! The caller-facing query representation: a predicate tree, a projection
//! list, order and group specifications, and eager-loading includes.

use serde_json::{Map, Value};

/// Comparison operators usable at a predicate leaf
#[derive(Debug, Clone, PartialEq)]
pub enum CmpOp {
    /// field = value (value `null` matches null/absent fields)
    Eq(Value),
    /// field != value
    Ne(Value),
    /// field > value
    Gt(Value),
    /// field >= value
    Gte(Value),
    /// field < value
    Lt(Value),
    /// field <= value
    Lte(Value),
    /// SQL LIKE with `%` (any run) and `_` (any single char) wildcards.
    /// `case_insensitive: None` defers to the database configuration.
    Like {
        /// The wildcard pattern
        pattern: String,
        /// Per-operator case override
        case_insensitive: Option<bool>,
    },
}

impl CmpOp {
    /// Returns the operator name for error messages
    pub fn op_name(&self) -> &'static str {
        match self {
            CmpOp::Eq(_) => "eq",
            CmpOp::Ne(_) => "ne",
            CmpOp::Gt(_) => "gt",
            CmpOp::Gte(_) => "gte",
            CmpOp::Lt(_) => "lt",
            CmpOp::Lte(_) => "lte",
            CmpOp::Like { .. } => "like",
        }
    }
}

/// Predicate tree evaluated bottom-up per record
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Leaf comparison on a field
    Cmp {
        /// Field name (or `id` for the primary key)
        field: String,
        /// Comparison operator
        op: CmpOp,
    },
    /// All children must match; an empty list matches everything
    And(Vec<Predicate>),
    /// Any child must match; an empty list matches nothing
    Or(Vec<Predicate>),
}

impl Predicate {
    fn cmp(field: impl Into<String>, op: CmpOp) -> Self {
        Predicate::Cmp {
            field: field.into(),
            op,
        }
    }

    /// Equality leaf
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::cmp(field, CmpOp::Eq(value))
    }

    /// Inequality leaf
    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::cmp(field, CmpOp::Ne(value))
    }

    /// Greater-than leaf
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::cmp(field, CmpOp::Gt(value))
    }

    /// Greater-or-equal leaf
    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::cmp(field, CmpOp::Gte(value))
    }

    /// Less-than leaf
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::cmp(field, CmpOp::Lt(value))
    }

    /// Less-or-equal leaf
    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::cmp(field, CmpOp::Lte(value))
    }

    /// LIKE leaf, case sensitivity per database configuration
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::cmp(
            field,
            CmpOp::Like {
                pattern: pattern.into(),
                case_insensitive: None,
            },
        )
    }

    /// LIKE leaf, forced case-insensitive
    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::cmp(
            field,
            CmpOp::Like {
                pattern: pattern.into(),
                case_insensitive: Some(true),
            },
        )
    }

    /// Explicit AND combinator
    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And(children)
    }

    /// Explicit OR combinator
    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or(children)
    }

    /// Implicit AND over a multi-key equality object, the most common
    /// `where` shape.
    pub fn from_object(fields: &Map<String, Value>) -> Self {
        Predicate::And(
            fields
                .iter()
                .map(|(k, v)| Predicate::eq(k, v.clone()))
                .collect(),
        )
    }
}

/// Scalar and aggregate functions usable in projections and order keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnKind {
    /// Aggregate: number of rows with a non-null value (column `*`
    /// counts every row)
    Count,
    /// Scalar: string length in characters, null passes through
    Length,
    /// Scalar: uppercased string, null passes through
    Upper,
}

impl FnKind {
    /// Returns the function name
    pub fn fn_name(&self) -> &'static str {
        match self {
            FnKind::Count => "count",
            FnKind::Length => "length",
            FnKind::Upper => "upper",
        }
    }

    /// Returns true for aggregate functions
    pub fn is_aggregate(&self) -> bool {
        matches!(self, FnKind::Count)
    }
}

/// One projected output column
#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    /// A field under its own name
    Column(String),
    /// A field under an alias
    Aliased {
        /// Source field
        column: String,
        /// Output name
        alias: String,
    },
    /// A function application under an alias
    Function {
        /// Function to apply
        function: FnKind,
        /// Argument column (`*` allowed for `Count`)
        column: String,
        /// Output name
        alias: String,
    },
}

impl SelectExpr {
    /// Plain column
    pub fn col(name: impl Into<String>) -> Self {
        SelectExpr::Column(name.into())
    }

    /// Aliased column
    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        SelectExpr::Aliased {
            column: column.into(),
            alias: alias.into(),
        }
    }

    /// Function application
    pub fn func(function: FnKind, column: impl Into<String>, alias: impl Into<String>) -> Self {
        SelectExpr::Function {
            function,
            column: column.into(),
            alias: alias.into(),
        }
    }

    /// Output column name (alias if present)
    pub fn output_name(&self) -> &str {
        match self {
            SelectExpr::Column(name) => name,
            SelectExpr::Aliased { alias, .. } => alias,
            SelectExpr::Function { alias, .. } => alias,
        }
    }

    /// Returns true if this projection needs aggregate context
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            SelectExpr::Function { function, .. } if function.is_aggregate()
        )
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl SortDirection {
    /// Returns the direction name
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// An order key: a column or a scalar function of a column
#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    /// Order by field value
    Column(String),
    /// Order by a scalar function of a field
    Function(FnKind, String),
}

/// One entry in a multi-key order specification
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    /// What to sort on
    pub key: OrderKey,
    /// Which way
    pub direction: SortDirection,
}

impl OrderSpec {
    /// Ascending column order
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            key: OrderKey::Column(column.into()),
            direction: SortDirection::Asc,
        }
    }

    /// Descending column order
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            key: OrderKey::Column(column.into()),
            direction: SortDirection::Desc,
        }
    }

    /// Function-keyed order
    pub fn by_fn(function: FnKind, column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: OrderKey::Function(function, column.into()),
            direction,
        }
    }
}

/// Options accepted by `find`
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Projection; `None` returns id plus every declared field
    pub attributes: Option<Vec<SelectExpr>>,
    /// Filter predicate tree
    pub filter: Option<Predicate>,
    /// Multi-key order specification, stable, ties keep scan order
    pub order: Vec<OrderSpec>,
    /// Group-by field names
    pub group: Vec<String>,
    /// Association names to eager-load per matched row
    pub include: Vec<String>,
    /// Maximum number of output rows
    pub limit: Option<usize>,
}

impl QueryOptions {
    /// Empty options: every record, default projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the projection
    pub fn select(mut self, attributes: Vec<SelectExpr>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Sets the filter predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Convenience: equality filter over a JSON object (implicit AND)
    pub fn filter_object(mut self, fields: &Map<String, Value>) -> Self {
        self.filter = Some(Predicate::from_object(fields));
        self
    }

    /// Appends an order key
    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.order.push(spec);
        self
    }

    /// Appends a group-by field
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group.push(field.into());
        self
    }

    /// Appends an association to eager-load
    pub fn include(mut self, association: impl Into<String>) -> Self {
        self.include.push(association.into());
        self
    }

    /// Sets the output row limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
