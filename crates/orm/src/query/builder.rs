//! Query Builder - Core builder implementation

use std::fmt;
use std::marker::PhantomData;

use super::state::QueryState;
use super::types::*;
use crate::model::Entity;

/// Fluent, append-only query against the table of `E`.
///
/// Chain methods consume and return the builder and never suspend; only the
/// terminal methods in `execution` and `pagination` touch the adapter.
pub struct QueryBuilder<E> {
    pub(crate) state: QueryState,
    pub(crate) relations: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for QueryBuilder<E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            relations: self.relations.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for QueryBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("state", &self.state)
            .field("relations", &self.relations)
            .finish()
    }
}

impl<E: Entity> Default for QueryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> QueryBuilder<E> {
    /// Fresh query state against the entity's table
    pub fn new() -> Self {
        Self {
            state: QueryState::new(E::table_name()),
            relations: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Skip rows stamped by `soft_delete`; unchanged for entities without a
    /// soft-delete column
    pub fn without_trashed(self) -> Self {
        match E::soft_delete_column() {
            Some(column) => self.where_null(column),
            None => self,
        }
    }

    /// Only rows stamped by `soft_delete`
    pub fn only_trashed(self) -> Self {
        match E::soft_delete_column() {
            Some(column) => self.where_not_null(column),
            None => self,
        }
    }
}

impl<E> QueryBuilder<E> {
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Relation names requested for eager loading, in request order
    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    /// Restrict the projection to the given columns
    pub fn select(mut self, columns: &[&str]) -> Self {
        let mut selected = match std::mem::take(&mut self.state.selection) {
            Selection::Columns(existing) => existing,
            _ => Vec::new(),
        };
        selected.extend(columns.iter().map(|c| c.trim().to_string()));
        self.state.selection = Selection::Columns(selected);
        self
    }

    /// Raw selection expression, handed to the engine verbatim
    pub fn select_raw(mut self, expression: &str) -> Self {
        self.state.selection = Selection::Raw(expression.to_string());
        self
    }

    /// Narrow the query to distinct rows of the current projection
    pub fn distinct(mut self) -> Self {
        self.state.distinct = true;
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.state.limit = Some(count);
        self
    }

    pub fn take(self, count: u64) -> Self {
        self.limit(count)
    }

    pub fn offset(mut self, count: u64) -> Self {
        self.state.offset = Some(count);
        self
    }

    pub fn skip(self, count: u64) -> Self {
        self.offset(count)
    }

    /// Request eager loading of declared relations.
    ///
    /// Names are resolved when the query executes; an undeclared name fails
    /// the terminal call with `RelationConfiguration`.
    pub fn with(mut self, relations: &[&str]) -> Self {
        for relation in relations {
            if !self.relations.iter().any(|r| r == relation) {
                self.relations.push(relation.to_string());
            }
        }
        self
    }
}
