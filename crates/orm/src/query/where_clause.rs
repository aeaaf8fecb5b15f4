//! Query Builder WHERE clause operations

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;

impl<E> QueryBuilder<E> {
    fn push(mut self, predicate: Predicate) -> Self {
        self.state.push_predicate(predicate);
        self
    }

    fn compare<T: Into<Value>>(self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.push(Predicate::Compare {
            column: column.to_string(),
            operator,
            value: value.into(),
        })
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::Equal, value)
    }

    /// Add WHERE condition with an explicit operator
    pub fn where_op<T: Into<Value>>(self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.compare(column, operator, value)
    }

    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::NotEqual, value)
    }

    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::GreaterThan, value)
    }

    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::GreaterThanOrEqual, value)
    }

    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::LessThan, value)
    }

    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.compare(column, QueryOperator::LessThanOrEqual, value)
    }

    /// Add WHERE condition with LIKE (`%` and `_` wildcards)
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.compare(column, QueryOperator::Like, pattern)
    }

    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.compare(column, QueryOperator::NotLike, pattern)
    }

    /// Compare two columns of the same row
    pub fn where_column(self, left: &str, operator: QueryOperator, right: &str) -> Self {
        self.push(Predicate::Columns {
            left: left.to_string(),
            operator,
            right: right.to_string(),
        })
    }

    /// Compare a column with a qualified column reference (`zones.id`)
    pub fn where_ref(self, column: &str, operator: QueryOperator, reference: &str) -> Self {
        self.push(Predicate::Reference {
            column: column.to_string(),
            operator,
            reference: reference.to_string(),
        })
    }

    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    pub fn where_not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    /// Inclusive range
    pub fn where_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.push(Predicate::Between {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
        })
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push(Predicate::Null {
            column: column.to_string(),
            negated: false,
        })
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push(Predicate::Null {
            column: column.to_string(),
            negated: true,
        })
    }

    /// Append one disjunction group of equality conditions.
    ///
    /// The result is `(existing AND ...) AND (c1 OR c2 OR ...)`. An empty
    /// condition list appends nothing.
    pub fn or_where<I, K, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let group: Vec<Predicate> = conditions
            .into_iter()
            .map(|(column, value)| Predicate::eq(column.as_ref(), value))
            .collect();

        if group.is_empty() {
            self
        } else {
            self.push(Predicate::AnyOf(group))
        }
    }

    /// Apply `callback` only when `condition` holds
    pub fn when<F>(self, condition: bool, callback: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            callback(self)
        } else {
            self
        }
    }
}
