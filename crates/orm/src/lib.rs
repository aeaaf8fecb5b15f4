//! # elif-record: active-record core for elif.rs
//!
//! One generic `Model<E>` and `QueryBuilder<E>` driven by a declarative
//! `Entity` descriptor per table: fluent append-only queries, batched eager
//! loading, mass-assignment filtering, lifecycle events and pagination, all
//! issued against a pluggable `ExecutionAdapter`.
//!
//! ```rust,no_run
//! use elif_record::prelude::*;
//! use serde_json::json;
//!
//! struct Route;
//!
//! impl Entity for Route {
//!     fn table_name() -> &'static str { "routes" }
//!     fn columns() -> &'static [&'static str] { &["id", "name", "status", "created_at", "updated_at"] }
//!     fn fillable() -> &'static [&'static str] { &["name", "status"] }
//! }
//!
//! # async fn run() -> ModelResult<()> {
//! let db = Database::new(MemoryAdapter::new());
//! let payload = json!({"name": "Alpha", "status": "active"});
//! let route = Model::<Route>::create(&db, payload.as_object().cloned().unwrap_or_default()).await?;
//! let active = Model::<Route>::where_eq("status", "active").count(&db).await?;
//! # let _ = (route, active);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod attributes;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod model;
pub mod query;
pub mod relationships;
pub mod security;
pub mod sql;
pub mod validation;


pub use adapter::{
    AdapterStats, AdapterStatsSnapshot, ExecutionAdapter, MemoryAdapter, PostgresAdapter,
    TableDefinition, TransactionScope,
};
pub use attributes::{AttributeStore, Record};
pub use config::{ConfigError, OrmConfig, PoolConfig};
pub use database::Database;
pub use error::{ModelError, ModelResult, Operation, OrmError, OrmResult};
pub use events::{BroadcastDispatcher, EventDispatcher, ModelEvent, ModelEventKind, NullDispatcher};
pub use model::{Entity, Model};
pub use query::{
    OrderDirection, Page, PaginationOptions, Paging, Predicate, QueryBuilder, QueryOperator,
    QueryState,
};
pub use relationships::{Relation, RelationLoader, RelationValue, RelationshipType};
pub use validation::{Payload, RequestPayload, Rules, ValidationError, ValidationErrors};

/// Everything needed to declare entities and run queries
pub mod prelude {
    pub use crate::adapter::{ExecutionAdapter, MemoryAdapter, PostgresAdapter, TableDefinition};
    pub use crate::attributes::Record;
    pub use crate::database::Database;
    pub use crate::error::{ModelError, ModelResult};
    pub use crate::events::{EventDispatcher, ModelEvent};
    pub use crate::model::{Entity, Model};
    pub use crate::query::{OrderDirection, PaginationOptions, QueryBuilder, QueryOperator};
    pub use crate::relationships::{Relation, RelationValue};
    pub use crate::validation::Payload;
}
