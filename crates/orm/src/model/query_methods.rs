//! Query Methods - static entry points on `Model<E>`
//!
//! Each one starts a fresh `QueryBuilder<E>`; the builder never borrows
//! from a model instance.

use std::future::Future;

use serde_json::Value;

use super::entity::Entity;
use super::Model;
use crate::database::Database;
use crate::error::ModelResult;
use crate::query::{Page, PaginationOptions, QueryBuilder, QueryOperator};

impl<E: Entity> Model<E> {
    /// Start a query against this entity's table
    pub fn query() -> QueryBuilder<E> {
        QueryBuilder::new()
    }

    /// Every row, unfiltered
    pub async fn all(db: &Database) -> ModelResult<Vec<Self>> {
        Self::query().get(db).await
    }

    pub async fn find<V: Into<Value>>(db: &Database, id: V) -> ModelResult<Option<Self>> {
        Self::query().find(db, id).await
    }

    pub async fn find_or_fail<V: Into<Value>>(db: &Database, id: V) -> ModelResult<Self> {
        Self::query().find_or_fail(db, id).await
    }

    pub async fn first(db: &Database) -> ModelResult<Option<Self>> {
        Self::query().first(db).await
    }

    pub async fn first_or_fail(db: &Database) -> ModelResult<Self> {
        Self::query().first_or_fail(db).await
    }

    /// Row with the highest primary key
    pub async fn last(db: &Database) -> ModelResult<Option<Self>> {
        Self::query().last(db).await
    }

    pub fn where_eq<T: Into<Value>>(column: &str, value: T) -> QueryBuilder<E> {
        Self::query().where_eq(column, value)
    }

    pub fn where_op<T: Into<Value>>(column: &str, operator: QueryOperator, value: T) -> QueryBuilder<E> {
        Self::query().where_op(column, operator, value)
    }

    pub fn where_in<T: Into<Value>>(column: &str, values: Vec<T>) -> QueryBuilder<E> {
        Self::query().where_in(column, values)
    }

    pub fn where_null(column: &str) -> QueryBuilder<E> {
        Self::query().where_null(column)
    }

    pub fn where_like(column: &str, pattern: &str) -> QueryBuilder<E> {
        Self::query().where_like(column, pattern)
    }

    /// Eager load `relations` on whatever the query returns
    pub fn with(relations: &[&str]) -> QueryBuilder<E> {
        Self::query().with(relations)
    }

    pub async fn count(db: &Database) -> ModelResult<u64> {
        Self::query().count(db).await
    }

    pub async fn paginate(db: &Database, options: PaginationOptions) -> ModelResult<Page<E>> {
        Self::query().paginate(db, options).await
    }

    pub async fn pluck(db: &Database, column: &str) -> ModelResult<Vec<Value>> {
        Self::query().pluck(db, column).await
    }

    /// Walk the whole table `size` rows at a time
    pub async fn chunk<F, Fut>(db: &Database, size: u64, callback: F) -> ModelResult<u64>
    where
        F: FnMut(Vec<Self>) -> Fut,
        Fut: Future<Output = ModelResult<()>>,
    {
        Self::query().chunk(db, size, callback).await
    }
}
