//! Query state - the executable description of a SELECT
//!
//! This is the value handed to the execution adapter. Builders only ever
//! append to it; nothing here removes a clause that was already added.

use super::types::*;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryState {
    pub(crate) table: String,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) order_by: Vec<OrderClause>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Vec<Predicate>,
    pub(crate) selection: Selection,
    pub(crate) distinct: bool,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl QueryState {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn order_by(&self) -> &[OrderClause] {
        &self.order_by
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn having(&self) -> &[Predicate] {
        &self.having
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub(crate) fn push_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Same filters, no projection, ordering or window.
    ///
    /// Used for counts and scalar aggregates over the current predicate set.
    pub(crate) fn filters_only(&self) -> Self {
        Self {
            table: self.table.clone(),
            predicates: self.predicates.clone(),
            ..Self::default()
        }
    }

    /// Same filters and grouping, used to count groups
    pub(crate) fn groups_only(&self) -> Self {
        Self {
            table: self.table.clone(),
            predicates: self.predicates.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            selection: Selection::Columns(self.group_by.clone()),
            ..Self::default()
        }
    }

    /// Same filters and projection with DISTINCT, used to count distinct rows
    pub(crate) fn distinct_only(&self) -> Self {
        Self {
            table: self.table.clone(),
            predicates: self.predicates.clone(),
            selection: self.selection.clone(),
            distinct: true,
            ..Self::default()
        }
    }

    pub(crate) fn aggregate(&self, expr: AggregateExpr) -> Self {
        let mut state = self.filters_only();
        state.selection = Selection::Aggregate(expr);
        state
    }
}
