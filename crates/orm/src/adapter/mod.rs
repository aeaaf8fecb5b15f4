//! Execution Adapter - the boundary to the relational engine
//!
//! The query builder and lifecycle manager only ever talk to an
//! `ExecutionAdapter`. Two engines ship with the crate:
//!
//! - `memory`: an in-process engine with transactions and statement counters
//! - `postgres`: sqlx-backed PostgreSQL execution

pub mod memory;
pub mod postgres;
pub mod statistics;

use async_trait::async_trait;
use serde_json::Value;

use crate::attributes::Record;
use crate::error::ModelResult;
use crate::query::{Predicate, QueryState};

pub use memory::{MemoryAdapter, TableDefinition};
pub use postgres::PostgresAdapter;
pub use statistics::{AdapterStats, AdapterStatsSnapshot};

/// Minimal CRUD surface of a relational engine
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Run a SELECT described by `state`
    async fn select(&self, state: &QueryState) -> ModelResult<Vec<Record>>;

    /// Insert `rows` as one batch and return the generated primary keys in
    /// row order. A failing row aborts the whole batch.
    async fn insert(&self, table: &str, primary_key: &str, rows: Vec<Record>) -> ModelResult<Vec<Value>>;

    /// Set `values` on every row matching `predicates`; returns affected rows
    async fn update(&self, table: &str, values: Record, predicates: &[Predicate]) -> ModelResult<u64>;

    /// Delete every row matching `predicates`; returns affected rows
    async fn delete(&self, table: &str, predicates: &[Predicate]) -> ModelResult<u64>;

    /// Open an atomic scope exposing the same CRUD surface
    async fn begin(&self) -> ModelResult<Box<dyn TransactionScope>>;
}

/// CRUD surface scoped to one atomic unit.
///
/// A scope is finished by exactly one of `commit` or `rollback`; any call
/// after that fails with a `Transaction` error.
#[async_trait]
pub trait TransactionScope: ExecutionAdapter {
    async fn commit(&self) -> ModelResult<()>;

    async fn rollback(&self) -> ModelResult<()>;
}
