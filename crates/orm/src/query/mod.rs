//! Query Builder Module - fluent, append-only queries over one entity
//!
//! - `types`: operators, predicates, ordering and aggregate expressions
//! - `state`: the immutable query value the adapters execute
//! - `builder`, `where_clause`, `ordering`: chain methods (never suspend)
//! - `execution`, `pagination`: terminal methods (run against a `Database`)

pub mod builder;
pub mod execution;
pub mod ordering;
pub mod pagination;
pub mod state;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use pagination::{Page, PaginationOptions, Paging};
pub use state::QueryState;
pub use types::{
    AggregateExpr, AggregateFunction, OrderClause, OrderDirection, Predicate, QueryOperator,
    Selection, AGGREGATE_COLUMN,
};
