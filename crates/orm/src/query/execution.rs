//! Query Builder execution - terminals that run the accumulated state
//!
//! Relation names are resolved before the first statement, so an unknown
//! name never costs a round trip.

use serde_json::Value;

use super::builder::QueryBuilder;
use super::state::QueryState;
use super::types::{AggregateExpr, AggregateFunction, AGGREGATE_COLUMN};
use crate::attributes::value_key;
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, Model};
use crate::relationships::RelationLoader;

impl<E: Entity> QueryBuilder<E> {
    /// Execute the query and hydrate every row, with requested relations
    pub async fn get(self, db: &Database) -> ModelResult<Vec<Model<E>>> {
        RelationLoader::resolve::<E>(&self.relations)?;

        let rows = db.adapter().select(&self.state).await?;
        let mut models: Vec<Model<E>> = rows.into_iter().map(Model::hydrate).collect();
        RelationLoader::load(db, &mut models, &self.relations).await?;
        Ok(models)
    }

    /// Every row of the table; chained predicates and windows are dropped,
    /// requested relations are kept
    pub async fn all(self, db: &Database) -> ModelResult<Vec<Model<E>>> {
        let mut unfiltered = Self::new();
        unfiltered.relations = self.relations;
        unfiltered.get(db).await
    }

    /// First row in the adapter's natural order unless an order was chained
    pub async fn first(self, db: &Database) -> ModelResult<Option<Model<E>>> {
        Ok(self.limit(1).get(db).await?.into_iter().next())
    }

    pub async fn first_or_fail(self, db: &Database) -> ModelResult<Model<E>> {
        self.first(db)
            .await?
            .ok_or_else(|| ModelError::not_found(E::entity_name(), None))
    }

    /// First row of the chained order, or of primary key descending when
    /// none was chained
    pub async fn last(self, db: &Database) -> ModelResult<Option<Model<E>>> {
        let query = if self.state.order_by().is_empty() {
            self.order_by_desc(E::primary_key_name())
        } else {
            self
        };
        query.first(db).await
    }

    /// Equality lookup on the primary key
    pub async fn find<V: Into<Value>>(self, db: &Database, id: V) -> ModelResult<Option<Model<E>>> {
        self.where_eq(E::primary_key_name(), id).first(db).await
    }

    pub async fn find_or_fail<V: Into<Value>>(self, db: &Database, id: V) -> ModelResult<Model<E>> {
        let id = id.into();
        let key = value_key(&id);
        self.find(db, id)
            .await?
            .ok_or_else(|| ModelError::not_found(E::entity_name(), key))
    }

    pub async fn exists(self, db: &Database) -> ModelResult<bool> {
        let mut state = self.state.filters_only();
        state.limit = Some(1);
        Ok(!db.adapter().select(&state).await?.is_empty())
    }

    /// Matching rows, or matching groups when the query is grouped.
    ///
    /// A `distinct()` query counts the distinct projected rows.
    pub async fn count(self, db: &Database) -> ModelResult<u64> {
        if !self.state.group_by().is_empty() {
            let groups = db.adapter().select(&self.state.groups_only()).await?;
            return Ok(groups.len() as u64);
        }
        if self.state.is_distinct() {
            let rows = db.adapter().select(&self.state.distinct_only()).await?;
            return Ok(rows.len() as u64);
        }

        let value = self.scalar(db, AggregateFunction::Count, None).await?;
        Ok(as_f64(&value).map_or(0, |count| count as u64))
    }

    pub async fn max(self, db: &Database, column: &str) -> ModelResult<Option<Value>> {
        let value = self.scalar(db, AggregateFunction::Max, Some(column)).await?;
        Ok((!value.is_null()).then_some(value))
    }

    pub async fn min(self, db: &Database, column: &str) -> ModelResult<Option<Value>> {
        let value = self.scalar(db, AggregateFunction::Min, Some(column)).await?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Sum over the matching rows; `0.0` when none match
    pub async fn sum(self, db: &Database, column: &str) -> ModelResult<f64> {
        let value = self.scalar(db, AggregateFunction::Sum, Some(column)).await?;
        Ok(as_f64(&value).unwrap_or(0.0))
    }

    pub async fn avg(self, db: &Database, column: &str) -> ModelResult<Option<f64>> {
        let value = self.scalar(db, AggregateFunction::Avg, Some(column)).await?;
        Ok(as_f64(&value))
    }

    /// One column of every row `get` returns, getters applied
    pub async fn pluck(self, db: &Database, column: &str) -> ModelResult<Vec<Value>> {
        let models = self.get(db).await?;
        Ok(models
            .iter()
            .map(|model| model.get(column).unwrap_or(Value::Null))
            .collect())
    }

    /// Run one aggregate over the filtered rows, ignoring grouping, order
    /// and windowing
    async fn scalar(
        &self,
        db: &Database,
        function: AggregateFunction,
        column: Option<&str>,
    ) -> ModelResult<Value> {
        let state: QueryState = self.state.aggregate(AggregateExpr::new(function, column));
        let rows = db.adapter().select(&state).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(AGGREGATE_COLUMN))
            .unwrap_or(Value::Null))
    }
}

/// Engines may hand numeric aggregates back as numbers or numeric strings
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
