//! SQL generation for PostgreSQL
//!
//! Every statement is rendered with `$n` placeholders and a parameter list;
//! identifiers are quoted, values are never interpolated.

use serde_json::Value;

use crate::attributes::Record;
use crate::error::ModelResult;
use crate::query::{AggregateExpr, AggregateFunction, Predicate, QueryState, Selection, AGGREGATE_COLUMN};
use crate::security::{escape_identifier, escape_qualified, validate_identifier, validate_query_pattern};

/// Rendered statement and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct SqlWriter {
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// NULL is written inline so PostgreSQL infers its type from context
    fn bind(&mut self, value: &Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.params.push(value.clone());
        format!("${}", self.params.len())
    }

    /// Bind a value written to or compared with `column`, casting the
    /// text forms of timestamps and uuids to their column type
    fn bind_for(&mut self, column: &str, value: &Value) -> String {
        let placeholder = self.bind(value);
        match (value.is_null(), column_cast(column)) {
            (false, Some(cast)) => format!("{}::{}", placeholder, cast),
            _ => placeholder,
        }
    }

    fn finish(self) -> SqlStatement {
        SqlStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Columns the lifecycle stamps with text-encoded values
const TYPED_COLUMNS: &[(&str, &str)] = &[
    ("created_at", "timestamptz"),
    ("updated_at", "timestamptz"),
    ("deleted_at", "timestamptz"),
    ("uuid", "uuid"),
];

fn column_cast(column: &str) -> Option<&'static str> {
    let name = column.rsplit('.').next().unwrap_or(column);
    TYPED_COLUMNS
        .iter()
        .find(|(typed, _)| *typed == name)
        .map(|(_, cast)| *cast)
}

fn aggregate_sql(expr: &AggregateExpr) -> String {
    let argument = expr
        .column
        .as_deref()
        .map(escape_qualified)
        .unwrap_or_else(|| "*".to_string());
    let call = format!("{}({})", expr.function, argument);
    match expr.function {
        // NUMERIC results are cast so they decode without a decimal crate
        AggregateFunction::Sum | AggregateFunction::Avg => {
            format!("CAST({} AS DOUBLE PRECISION)", call)
        }
        _ => call,
    }
}

/// Column reference or aggregate expression
fn column_sql(column: &str) -> String {
    match AggregateExpr::parse(column) {
        Some(expr) => aggregate_sql(&expr),
        None => escape_qualified(column),
    }
}

fn predicate_sql(writer: &mut SqlWriter, predicate: &Predicate) -> String {
    match predicate {
        Predicate::Compare { column, operator, value } => {
            let placeholder = writer.bind_for(column, value);
            format!("{} {} {}", column_sql(column), operator, placeholder)
        }
        Predicate::Columns { left, operator, right } => {
            format!("{} {} {}", escape_qualified(left), operator, escape_qualified(right))
        }
        Predicate::Reference { column, operator, reference } => {
            format!("{} {} {}", escape_qualified(column), operator, escape_qualified(reference))
        }
        Predicate::In { column, values, negated } => {
            if values.is_empty() {
                return if *negated { "TRUE".to_string() } else { "FALSE".to_string() };
            }
            let placeholders: Vec<String> = values.iter().map(|v| writer.bind_for(column, v)).collect();
            format!(
                "{} {}IN ({})",
                escape_qualified(column),
                if *negated { "NOT " } else { "" },
                placeholders.join(", ")
            )
        }
        Predicate::Between { column, low, high } => {
            let low = writer.bind_for(column, low);
            let high = writer.bind_for(column, high);
            format!("{} BETWEEN {} AND {}", escape_qualified(column), low, high)
        }
        Predicate::Null { column, negated } => format!(
            "{} IS {}NULL",
            escape_qualified(column),
            if *negated { "NOT " } else { "" }
        ),
        Predicate::AnyOf(group) => {
            if group.is_empty() {
                return "FALSE".to_string();
            }
            let parts: Vec<String> = group.iter().map(|p| predicate_sql(writer, p)).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn push_conditions(writer: &mut SqlWriter, keyword: &str, predicates: &[Predicate]) {
    if predicates.is_empty() {
        return;
    }
    let parts: Vec<String> = predicates.iter().map(|p| predicate_sql(writer, p)).collect();
    writer.push(&format!(" {} {}", keyword, parts.join(" AND ")));
}

fn projection_sql(state: &QueryState) -> ModelResult<String> {
    Ok(match state.selection() {
        Selection::All => "*".to_string(),
        Selection::Columns(columns) => columns
            .iter()
            .map(|column| match AggregateExpr::parse(column) {
                Some(expr) => format!("{} AS {}", aggregate_sql(&expr), escape_identifier(column)),
                None => escape_qualified(column),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Selection::Raw(expression) => {
            validate_query_pattern(expression)?;
            expression.clone()
        }
        Selection::Aggregate(expr) => {
            let mut parts: Vec<String> = state.group_by().iter().map(|c| escape_qualified(c)).collect();
            parts.push(format!("{} AS {}", aggregate_sql(expr), escape_identifier(AGGREGATE_COLUMN)));
            parts.join(", ")
        }
    })
}

/// Render a SELECT for `state`
pub fn select_sql(state: &QueryState) -> ModelResult<SqlStatement> {
    validate_identifier(state.table())?;
    let mut writer = SqlWriter::default();
    writer.push(if state.is_distinct() { "SELECT DISTINCT " } else { "SELECT " });
    writer.push(&projection_sql(state)?);
    writer.push(" FROM ");
    writer.push(&escape_identifier(state.table()));

    push_conditions(&mut writer, "WHERE", state.predicates());

    if !state.group_by().is_empty() {
        let columns: Vec<String> = state.group_by().iter().map(|c| escape_qualified(c)).collect();
        writer.push(&format!(" GROUP BY {}", columns.join(", ")));
    }

    push_conditions(&mut writer, "HAVING", state.having());

    if !state.order_by().is_empty() {
        let keys: Vec<String> = state
            .order_by()
            .iter()
            .map(|clause| format!("{} {}", column_sql(&clause.column), clause.direction))
            .collect();
        writer.push(&format!(" ORDER BY {}", keys.join(", ")));
    }

    if let Some(limit) = state.limit() {
        writer.push(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = state.offset() {
        writer.push(&format!(" OFFSET {}", offset));
    }

    Ok(writer.finish())
}

/// Render a multi-row INSERT returning the primary key.
///
/// The column list is the union of all row keys in first-seen order; a row
/// missing a column gets `DEFAULT`.
pub fn insert_sql(table: &str, primary_key: &str, rows: &[Record]) -> SqlStatement {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for column in row.keys() {
            if !columns.contains(&column.as_str()) {
                columns.push(column.as_str());
            }
        }
    }
    if columns.is_empty() {
        columns.push(primary_key);
    }

    let mut writer = SqlWriter::default();
    writer.push(&format!(
        "INSERT INTO {} ({}) VALUES ",
        escape_identifier(table),
        columns
            .iter()
            .map(|c| escape_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    ));

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let values: Vec<String> = columns
            .iter()
            .map(|column| match row.get(*column) {
                Some(value) => writer.bind_for(column, value),
                None => "DEFAULT".to_string(),
            })
            .collect();
        tuples.push(format!("({})", values.join(", ")));
    }
    writer.push(&tuples.join(", "));
    writer.push(&format!(" RETURNING {}", escape_identifier(primary_key)));
    writer.finish()
}

pub fn update_sql(table: &str, values: &Record, predicates: &[Predicate]) -> SqlStatement {
    let mut writer = SqlWriter::default();
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, value)| format!("{} = {}", escape_identifier(column), writer.bind_for(column, value)))
        .collect();
    writer.push(&format!(
        "UPDATE {} SET {}",
        escape_identifier(table),
        assignments.join(", ")
    ));
    push_conditions(&mut writer, "WHERE", predicates);
    writer.finish()
}

pub fn delete_sql(table: &str, predicates: &[Predicate]) -> SqlStatement {
    let mut writer = SqlWriter::default();
    writer.push(&format!("DELETE FROM {}", escape_identifier(table)));
    push_conditions(&mut writer, "WHERE", predicates);
    writer.finish()
}
