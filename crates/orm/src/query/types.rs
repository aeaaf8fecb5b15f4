//! Query Builder Types - Core types and enums for query building

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ModelError;

/// Comparison operators usable in `where_op`, `where_column` and `having`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

impl FromStr for QueryOperator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "=" | "==" => Ok(QueryOperator::Equal),
            "!=" | "<>" => Ok(QueryOperator::NotEqual),
            ">" => Ok(QueryOperator::GreaterThan),
            ">=" => Ok(QueryOperator::GreaterThanOrEqual),
            "<" => Ok(QueryOperator::LessThan),
            "<=" => Ok(QueryOperator::LessThanOrEqual),
            "like" => Ok(QueryOperator::Like),
            "not like" => Ok(QueryOperator::NotLike),
            other => Err(ModelError::Query(format!("Unsupported operator '{}'", other))),
        }
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One filter condition of a query.
///
/// `AnyOf` is a single disjunction group; every other variant is one
/// conjunct of the surrounding chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        operator: QueryOperator,
        value: Value,
    },
    /// Two columns of the same row
    Columns {
        left: String,
        operator: QueryOperator,
        right: String,
    },
    /// Column against a qualified reference such as `zones.id`
    Reference {
        column: String,
        operator: QueryOperator,
        reference: String,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.to_string(),
            operator: QueryOperator::Equal,
            value: value.into(),
        }
    }

    pub fn is_in(column: &str, values: Vec<Value>) -> Self {
        Predicate::In {
            column: column.to_string(),
            values,
            negated: false,
        }
    }
}

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub column: String,
    pub direction: OrderDirection,
}

/// Aggregate functions the adapters understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

/// `function(column)`; a `None` column means `*`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub column: Option<String>,
}

impl AggregateExpr {
    pub fn new(function: AggregateFunction, column: Option<&str>) -> Self {
        Self {
            function,
            column: column.map(str::to_string),
        }
    }

    /// Parse expressions such as `count(*)`, `SUM(amount)` or `max( price )`.
    ///
    /// Returns `None` for plain column names.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        let open = expr.find('(')?;
        if !expr.ends_with(')') {
            return None;
        }
        let function = match expr[..open].trim().to_lowercase().as_str() {
            "count" => AggregateFunction::Count,
            "sum" => AggregateFunction::Sum,
            "avg" => AggregateFunction::Avg,
            "min" => AggregateFunction::Min,
            "max" => AggregateFunction::Max,
            _ => return None,
        };
        let inner = expr[open + 1..expr.len() - 1].trim();
        if inner.is_empty() {
            return None;
        }
        let column = (inner != "*").then(|| inner.to_string());
        Some(Self { function, column })
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{}({})", self.function, column),
            None => write!(f, "{}(*)", self.function),
        }
    }
}

/// Name of the column aggregate selections come back under
pub const AGGREGATE_COLUMN: &str = "aggregate";

/// What a SELECT projects
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    #[default]
    All,
    Columns(Vec<String>),
    /// Passed to the engine verbatim
    Raw(String),
    Aggregate(AggregateExpr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<QueryOperator>().unwrap(), QueryOperator::Equal);
        assert_eq!("<>".parse::<QueryOperator>().unwrap(), QueryOperator::NotEqual);
        assert_eq!("NOT LIKE".parse::<QueryOperator>().unwrap(), QueryOperator::NotLike);
        assert!("~".parse::<QueryOperator>().is_err());
    }

    #[test]
    fn test_aggregate_expression_parsing() {
        let expr = AggregateExpr::parse("count(*)").unwrap();
        assert_eq!(expr.function, AggregateFunction::Count);
        assert_eq!(expr.column, None);

        let expr = AggregateExpr::parse("SUM( amount )").unwrap();
        assert_eq!(expr.function, AggregateFunction::Sum);
        assert_eq!(expr.column.as_deref(), Some("amount"));
        assert_eq!(expr.to_string(), "SUM(amount)");

        assert!(AggregateExpr::parse("status").is_none());
        assert!(AggregateExpr::parse("lower(name)").is_none());
        assert!(AggregateExpr::parse("count()").is_none());
    }
}
