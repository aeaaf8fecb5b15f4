//! Row-level evaluation for the in-memory engine
//!
//! Comparison follows SQL three-valued logic: any comparison involving NULL
//! is unknown and filters the row out. Numbers compare numerically against
//! numbers and numeric strings.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Number, Value};

use crate::attributes::{value_key, Record};
use crate::error::{ModelError, ModelResult};
use crate::query::{
    AggregateExpr, AggregateFunction, OrderClause, OrderDirection, Predicate, QueryOperator,
    QueryState, Selection, AGGREGATE_COLUMN,
};

static NULL: Value = Value::Null;

/// Look up `column` on a row, accepting `table.column` for the row's own table
pub(super) fn column_value<'a>(row: &'a Record, table: &str, column: &str) -> &'a Value {
    if let Some(value) = row.get(column) {
        return value;
    }
    match column.split_once('.') {
        Some((qualifier, name)) if qualifier == table => row.get(name).unwrap_or(&NULL),
        _ => &NULL,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// SQL comparison; `None` when either side is NULL or the types do not compare
pub(super) fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            let (a, b) = (as_f64(left)?, as_f64(right)?);
            a.partial_cmp(&b)
        }
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn like(value: &Value, pattern: &Value) -> ModelResult<Option<bool>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let pattern = match pattern {
        Value::Null => return Ok(None),
        Value::String(s) => s.as_str(),
        other => return Err(ModelError::Query(format!("LIKE pattern must be a string, got {}", other))),
    };

    let mut expression = String::with_capacity(pattern.len() + 2);
    expression.push('^');
    let mut buffer = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => expression.push_str("(?s:.*)"),
            '_' => expression.push_str("(?s:.)"),
            other => expression.push_str(&regex::escape(other.encode_utf8(&mut buffer))),
        }
    }
    expression.push('$');

    let regex = Regex::new(&expression)
        .map_err(|e| ModelError::Query(format!("Invalid LIKE pattern '{}': {}", pattern, e)))?;
    Ok(Some(regex.is_match(&text)))
}

fn apply_operator(operator: QueryOperator, left: &Value, right: &Value) -> ModelResult<bool> {
    let result = match operator {
        QueryOperator::Like => like(left, right)?,
        QueryOperator::NotLike => like(left, right)?.map(|matched| !matched),
        _ => compare(left, right).map(|ordering| match operator {
            QueryOperator::Equal => ordering == Ordering::Equal,
            QueryOperator::NotEqual => ordering != Ordering::Equal,
            QueryOperator::GreaterThan => ordering == Ordering::Greater,
            QueryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            QueryOperator::LessThan => ordering == Ordering::Less,
            QueryOperator::LessThanOrEqual => ordering != Ordering::Greater,
            QueryOperator::Like | QueryOperator::NotLike => false,
        }),
    };
    Ok(result.unwrap_or(false))
}

/// Evaluate one predicate against a row
pub(super) fn matches(row: &Record, table: &str, predicate: &Predicate) -> ModelResult<bool> {
    match predicate {
        Predicate::Compare { column, operator, value } => {
            apply_operator(*operator, column_value(row, table, column), value)
        }
        Predicate::Columns { left, operator, right } => apply_operator(
            *operator,
            column_value(row, table, left),
            column_value(row, table, right),
        ),
        Predicate::Reference { column, operator, reference } => apply_operator(
            *operator,
            column_value(row, table, column),
            column_value(row, table, reference),
        ),
        Predicate::In { column, values, negated } => {
            let value = column_value(row, table, column);
            if value.is_null() {
                return Ok(false);
            }
            let found = values
                .iter()
                .any(|candidate| compare(value, candidate) == Some(Ordering::Equal));
            Ok(found != *negated)
        }
        Predicate::Between { column, low, high } => {
            let value = column_value(row, table, column);
            Ok(matches!(compare(value, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(value, high), Some(Ordering::Less | Ordering::Equal)))
        }
        Predicate::Null { column, negated } => {
            Ok(column_value(row, table, column).is_null() != *negated)
        }
        Predicate::AnyOf(group) => {
            for inner in group {
                if matches(row, table, inner)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

pub(super) fn matches_all(row: &Record, table: &str, predicates: &[Predicate]) -> ModelResult<bool> {
    for predicate in predicates {
        if !matches(row, table, predicate)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

/// Total order used for sorting; NULL sorts above everything
fn sort_cmp(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => compare(left, right).unwrap_or_else(|| {
            type_rank(left)
                .cmp(&type_rank(right))
                .then_with(|| left.to_string().cmp(&right.to_string()))
        }),
    }
}

/// Stable multi-key sort; NULLS LAST ascending, NULLS FIRST descending
pub(super) fn sort_rows(rows: &mut [Record], table: &str, order_by: &[OrderClause]) {
    if order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for clause in order_by {
            let ordering = sort_cmp(
                column_value(a, table, &clause.column),
                column_value(b, table, &clause.column),
            );
            let ordering = match clause.direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Compute an aggregate over a set of rows
pub(super) fn aggregate(expr: &AggregateExpr, rows: &[&Record], table: &str) -> Value {
    let values = || {
        rows.iter().filter_map(move |row| match &expr.column {
            Some(column) => Some(column_value(row, table, column)).filter(|v| !v.is_null()),
            None => Some(&NULL),
        })
    };

    match expr.function {
        AggregateFunction::Count => Value::from(values().count() as u64),
        AggregateFunction::Sum => {
            let numbers: Vec<f64> = values().filter_map(as_f64).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                number(numbers.iter().sum())
            }
        }
        AggregateFunction::Avg => {
            let numbers: Vec<f64> = values().filter_map(as_f64).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                Number::from_f64(numbers.iter().sum::<f64>() / numbers.len() as f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        AggregateFunction::Min => values()
            .filter(|v| !v.is_null())
            .min_by(|a, b| sort_cmp(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunction::Max => values()
            .filter(|v| !v.is_null())
            .max_by(|a, b| sort_cmp(a, b))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

fn selects_aggregate(selection: &Selection) -> bool {
    match selection {
        Selection::Aggregate(_) => true,
        Selection::Columns(columns) => columns.iter().any(|c| AggregateExpr::parse(c).is_some()),
        _ => false,
    }
}

fn project(row: &Record, table: &str, columns: &[String]) -> Record {
    columns
        .iter()
        .map(|column| {
            let name = column
                .split_once('.')
                .map(|(_, name)| name)
                .unwrap_or(column);
            (name.to_string(), column_value(row, table, column).clone())
        })
        .collect()
}

fn having_matches(group: &[&Record], table: &str, having: &[Predicate]) -> ModelResult<bool> {
    for predicate in having {
        let satisfied = match predicate {
            Predicate::Compare { column, operator, value } => {
                let left = match AggregateExpr::parse(column) {
                    Some(expr) => aggregate(&expr, group, table),
                    None => group
                        .first()
                        .map(|row| column_value(row, table, column).clone())
                        .unwrap_or(Value::Null),
                };
                apply_operator(*operator, &left, value)?
            }
            other => match group.first() {
                Some(row) => matches(row, table, other)?,
                None => false,
            },
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn select_groups(rows: Vec<&Record>, state: &QueryState) -> ModelResult<Vec<Record>> {
    let table = state.table();
    let mut groups: Vec<(Vec<Option<String>>, Vec<&Record>)> = Vec::new();

    if state.group_by().is_empty() {
        groups.push((Vec::new(), rows));
    } else {
        for row in rows {
            let key: Vec<Option<String>> = state
                .group_by()
                .iter()
                .map(|column| value_key(column_value(row, table, column)))
                .collect();
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, members)) => members.push(row),
                None => groups.push((key, vec![row])),
            }
        }
    }

    let mut output = Vec::with_capacity(groups.len());
    for (_, members) in groups {
        if !having_matches(&members, table, state.having())? {
            continue;
        }
        let mut record = match members.first() {
            Some(first) => project(first, table, state.group_by()),
            None => Record::new(),
        };
        match state.selection() {
            Selection::Aggregate(expr) => {
                record.insert(AGGREGATE_COLUMN.to_string(), aggregate(expr, &members, table));
            }
            Selection::Columns(columns) => {
                let mut projected = Record::new();
                for column in columns {
                    let value = match AggregateExpr::parse(column) {
                        Some(expr) => aggregate(&expr, &members, table),
                        None => record.get(column).cloned().unwrap_or(Value::Null),
                    };
                    projected.insert(column.clone(), value);
                }
                record = projected;
            }
            Selection::All | Selection::Raw(_) => {}
        }
        output.push(record);
    }
    Ok(output)
}

fn dedup(rows: Vec<Record>) -> Vec<Record> {
    let mut unique: Vec<Record> = Vec::with_capacity(rows.len());
    for row in rows {
        if !unique.contains(&row) {
            unique.push(row);
        }
    }
    unique
}

fn window(rows: Vec<Record>, state: &QueryState) -> Vec<Record> {
    let offset = state.offset().unwrap_or(0) as usize;
    let iter = rows.into_iter().skip(offset);
    match state.limit() {
        Some(limit) => iter.take(limit as usize).collect(),
        None => iter.collect(),
    }
}

/// Run a SELECT over the rows of one table.
///
/// Order of evaluation: filter, group/having, order, project, distinct,
/// offset/limit.
pub(super) fn select(rows: &[Record], state: &QueryState) -> ModelResult<Vec<Record>> {
    if let Selection::Raw(expression) = state.selection() {
        return Err(ModelError::Query(format!(
            "Raw selection '{}' is not supported by the memory adapter",
            expression
        )));
    }
    let table = state.table();

    let mut filtered = Vec::new();
    for row in rows {
        if matches_all(row, table, state.predicates())? {
            filtered.push(row);
        }
    }

    let mut output = if !state.group_by().is_empty() || selects_aggregate(state.selection()) {
        let mut grouped = select_groups(filtered, state)?;
        sort_rows(&mut grouped, table, state.order_by());
        grouped
    } else {
        let mut owned: Vec<Record> = filtered.into_iter().cloned().collect();
        sort_rows(&mut owned, table, state.order_by());
        match state.selection() {
            Selection::Columns(columns) => owned.iter().map(|row| project(row, table, columns)).collect(),
            _ => owned,
        }
    };

    if state.is_distinct() {
        output = dedup(output);
    }
    Ok(window(output, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        let row = record(json!({"status": null}));
        let ne = Predicate::Compare {
            column: "status".to_string(),
            operator: QueryOperator::NotEqual,
            value: json!("active"),
        };
        assert!(!matches(&row, "routes", &ne).unwrap());
        let not_in = Predicate::In {
            column: "status".to_string(),
            values: vec![json!("active")],
            negated: true,
        };
        assert!(!matches(&row, "routes", &not_in).unwrap());
    }

    #[test]
    fn test_numeric_strings_compare_as_numbers() {
        assert_eq!(compare(&json!("10"), &json!(9)), Some(Ordering::Greater));
        assert_eq!(compare(&json!(2), &json!(2.0)), Some(Ordering::Equal));
        assert_eq!(compare(&json!("abc"), &json!(1)), None);
    }

    #[test]
    fn test_like_wildcards_are_anchored() {
        assert_eq!(like(&json!("Alpha Route"), &json!("Alpha%")).unwrap(), Some(true));
        assert_eq!(like(&json!("Alpha"), &json!("_lpha")).unwrap(), Some(true));
        assert_eq!(like(&json!("The Alpha"), &json!("Alpha%")).unwrap(), Some(false));
        assert_eq!(like(&json!("a.c"), &json!("a.c")).unwrap(), Some(true));
        assert_eq!(like(&json!("abc"), &json!("a.c")).unwrap(), Some(false));
    }

    #[test]
    fn test_nulls_sort_last_ascending_and_first_descending() {
        let mut rows = vec![
            record(json!({"n": null})),
            record(json!({"n": 2})),
            record(json!({"n": 1})),
        ];
        let asc = [OrderClause { column: "n".to_string(), direction: OrderDirection::Asc }];
        sort_rows(&mut rows, "t", &asc);
        assert_eq!(rows[0]["n"], json!(1));
        assert_eq!(rows[2]["n"], Value::Null);

        let desc = [OrderClause { column: "n".to_string(), direction: OrderDirection::Desc }];
        sort_rows(&mut rows, "t", &desc);
        assert_eq!(rows[0]["n"], Value::Null);
        assert_eq!(rows[1]["n"], json!(2));
    }

    #[test]
    fn test_grouping_with_having_on_count() {
        let rows = vec![
            record(json!({"zone_id": 1, "amount": 5})),
            record(json!({"zone_id": 1, "amount": 7})),
            record(json!({"zone_id": 2, "amount": 3})),
        ];
        let mut state = QueryState::new("routes");
        state.group_by.push("zone_id".to_string());
        state.having.push(Predicate::Compare {
            column: "count(*)".to_string(),
            operator: QueryOperator::GreaterThan,
            value: json!(1),
        });
        state.selection = Selection::Columns(vec!["zone_id".to_string(), "sum(amount)".to_string()]);

        let output = select(&rows, &state).unwrap();
        assert_eq!(output, vec![record(json!({"zone_id": 1, "sum(amount)": 12}))]);
    }

    #[test]
    fn test_aggregate_over_empty_set_yields_one_row() {
        let state = QueryState::new("routes").aggregate(AggregateExpr::new(AggregateFunction::Count, None));
        let output = select(&[], &state).unwrap();
        assert_eq!(output, vec![record(json!({"aggregate": 0}))]);

        let state = QueryState::new("routes").aggregate(AggregateExpr::new(AggregateFunction::Sum, Some("amount")));
        let output = select(&[], &state).unwrap();
        assert_eq!(output[0]["aggregate"], Value::Null);
    }
}
