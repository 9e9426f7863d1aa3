//! Query Engine subsystem for tabula
//!
//! Declarative reads over the row store: a predicate tree for filtering,
//! ordered projection with scalar and aggregate functions, stable
//! multi-key sorting, grouping, and association eager loading.

mod ast;
mod errors;
mod exec;
mod filter;
mod sorter;

pub use ast::{
    CmpOp, FnKind, OrderKey, OrderSpec, Predicate, QueryOptions, SelectExpr, SortDirection,
};
pub use errors::{QueryError, QueryResult};
pub use exec::{QueryEngine, ResultRow};
pub use filter::{PredicateFilter, PK_FIELD};
pub use sorter::ResultSorter;
