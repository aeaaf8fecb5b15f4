//! Query Builder ORDER BY, GROUP BY and HAVING operations

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;

impl<E> QueryBuilder<E> {
    /// Append an ascending sort key; earlier keys keep priority
    pub fn order_by(self, column: &str) -> Self {
        self.order_by_direction(column, OrderDirection::Asc)
    }

    /// Append a descending sort key
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by_direction(column, OrderDirection::Desc)
    }

    pub fn order_by_direction(mut self, column: &str, direction: OrderDirection) -> Self {
        self.state.order_by.push(OrderClause {
            column: column.to_string(),
            direction,
        });
        self
    }

    /// Newest first by the given column
    pub fn latest(self, column: &str) -> Self {
        self.order_by_desc(column)
    }

    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column)
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.state.group_by.push(column.to_string());
        self
    }

    /// Add a HAVING condition.
    ///
    /// `column` may be a grouped column or an aggregate expression such as
    /// `count(*)`. Calling this without a prior `group_by` is not rejected.
    pub fn having<T: Into<Value>>(mut self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.state.having.push(Predicate::Compare {
            column: column.to_string(),
            operator,
            value: value.into(),
        });
        self
    }
}
