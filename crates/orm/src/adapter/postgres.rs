//! PostgreSQL execution through sqlx

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgConnection, PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;

use super::statistics::AdapterStats;
use super::{ExecutionAdapter, TransactionScope};
use crate::attributes::Record;
use crate::config::{OrmConfig, PoolConfig};
use crate::error::{ModelError, ModelResult};
use crate::query::{Predicate, QueryState};
use crate::sql::{delete_sql, insert_sql, select_sql, update_sql, SqlStatement};

/// Bind a JSON value with the closest native PostgreSQL type
fn bind_json_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        // Rendered inline as NULL; kept for statements built elsewhere
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        // Arrays and objects go in as JSONB
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value.clone())),
    }
}

fn build_query(statement: &SqlStatement) -> Query<'_, Postgres, PgArguments> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), bind_json_value)
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Convert a PostgreSQL row into a record, trying native types in turn
fn row_to_record(row: &PgRow) -> Record {
    let mut record = Record::new();

    for (i, column) in row.columns().iter().enumerate() {
        let value = if let Ok(value) = row.try_get::<Option<String>, _>(i) {
            value.map_or(Value::Null, Value::String)
        } else if let Ok(value) = row.try_get::<Option<i64>, _>(i) {
            value.map_or(Value::Null, Value::from)
        } else if let Ok(value) = row.try_get::<Option<i32>, _>(i) {
            value.map_or(Value::Null, Value::from)
        } else if let Ok(value) = row.try_get::<Option<i16>, _>(i) {
            value.map_or(Value::Null, Value::from)
        } else if let Ok(value) = row.try_get::<Option<f64>, _>(i) {
            value.map_or(Value::Null, float)
        } else if let Ok(value) = row.try_get::<Option<f32>, _>(i) {
            value.map_or(Value::Null, |v| float(v as f64))
        } else if let Ok(value) = row.try_get::<Option<bool>, _>(i) {
            value.map_or(Value::Null, Value::Bool)
        } else if let Ok(value) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
            value.map_or(Value::Null, |v| {
                Value::String(v.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
            })
        } else if let Ok(value) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        } else if let Ok(value) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        } else if let Ok(value) = row.try_get::<Option<uuid::Uuid>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        } else if let Ok(value) = row.try_get::<Option<Value>, _>(i) {
            value.unwrap_or(Value::Null)
        } else {
            tracing::warn!(
                "Column '{}' has an unsupported type ({}); reading it as NULL",
                column.name(),
                column.type_info()
            );
            Value::Null
        };

        record.insert(column.name().to_string(), value);
    }

    record
}

fn log_statement(enabled: bool, statement: &SqlStatement) {
    if enabled {
        tracing::debug!(
            "postgres: {} ({} params)",
            statement.sql,
            statement.params.len()
        );
    }
}

async fn run_select(conn: &mut PgConnection, statement: &SqlStatement) -> ModelResult<Vec<Record>> {
    let rows = build_query(statement).fetch_all(conn).await?;
    Ok(rows.iter().map(row_to_record).collect())
}

async fn run_insert(
    conn: &mut PgConnection,
    statement: &SqlStatement,
    primary_key: &str,
) -> ModelResult<Vec<Value>> {
    let rows = build_query(statement).fetch_all(conn).await?;
    Ok(rows
        .iter()
        .map(|row| row_to_record(row).remove(primary_key).unwrap_or(Value::Null))
        .collect())
}

async fn run_execute(conn: &mut PgConnection, statement: &SqlStatement) -> ModelResult<u64> {
    let result = build_query(statement).execute(conn).await?;
    Ok(result.rows_affected())
}

/// sqlx-backed `ExecutionAdapter`
#[derive(Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
    stats: Arc<AdapterStats>,
    log_statements: bool,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("pool_size", &self.pool.size())
            .field("log_statements", &self.log_statements)
            .finish()
    }
}

impl PostgresAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            stats: Arc::new(AdapterStats::new()),
            log_statements: false,
        }
    }

    /// Create a pool from `config` and wrap it
    pub async fn connect(config: &PoolConfig) -> ModelResult<Self> {
        config.validate()?;
        tracing::debug!(
            "Creating database pool with config: max={}, min={}, timeout={}s, idle_timeout={:?}s, max_lifetime={:?}s, test_before_acquire={}",
            config.max_connections,
            config.min_connections,
            config.acquire_timeout,
            config.idle_timeout,
            config.max_lifetime,
            config.test_before_acquire
        );

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }
        if let Some(max_lifetime) = config.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options.connect(&config.database_url).await.map_err(|e| {
            tracing::error!("Failed to create database pool: {}", e);
            ModelError::Connection(format!("Failed to create database pool: {}", e))
        })?;

        tracing::info!(
            "Database pool created with {} max connections",
            config.max_connections
        );
        Ok(Self::new(pool))
    }

    /// Connect with `PoolConfig::from_env` and `OrmConfig::from_env`
    pub async fn from_env() -> ModelResult<Self> {
        let orm = OrmConfig::from_env()?;
        let adapter = Self::connect(&PoolConfig::from_env()?).await?;
        Ok(adapter.log_statements(orm.log_statements))
    }

    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn stats(&self) -> &AdapterStats {
        &self.stats
    }
}

#[async_trait]
impl ExecutionAdapter for PostgresAdapter {
    async fn select(&self, state: &QueryState) -> ModelResult<Vec<Record>> {
        self.stats.record_select();
        let statement = select_sql(state)?;
        log_statement(self.log_statements, &statement);
        let mut conn = self.pool.acquire().await?;
        run_select(&mut conn, &statement).await
    }

    async fn insert(&self, table: &str, primary_key: &str, rows: Vec<Record>) -> ModelResult<Vec<Value>> {
        self.stats.record_insert();
        let statement = insert_sql(table, primary_key, &rows);
        log_statement(self.log_statements, &statement);
        let mut conn = self.pool.acquire().await?;
        run_insert(&mut conn, &statement, primary_key).await
    }

    async fn update(&self, table: &str, values: Record, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_update();
        let statement = update_sql(table, &values, predicates);
        log_statement(self.log_statements, &statement);
        let mut conn = self.pool.acquire().await?;
        run_execute(&mut conn, &statement).await
    }

    async fn delete(&self, table: &str, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_delete();
        let statement = delete_sql(table, predicates);
        log_statement(self.log_statements, &statement);
        let mut conn = self.pool.acquire().await?;
        run_execute(&mut conn, &statement).await
    }

    async fn begin(&self) -> ModelResult<Box<dyn TransactionScope>> {
        self.stats.record_transaction();
        let tx = self.pool.begin().await?;
        tracing::debug!("postgres: transaction started");
        Ok(Box::new(PostgresTransaction {
            tx: Mutex::new(Some(tx)),
            stats: self.stats.clone(),
            log_statements: self.log_statements,
        }))
    }
}

/// Transaction scope over one pooled connection
pub struct PostgresTransaction {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
    stats: Arc<AdapterStats>,
    log_statements: bool,
}

fn finished() -> ModelError {
    ModelError::Transaction("Transaction already finished".to_string())
}

#[async_trait]
impl ExecutionAdapter for PostgresTransaction {
    async fn select(&self, state: &QueryState) -> ModelResult<Vec<Record>> {
        self.stats.record_select();
        let statement = select_sql(state)?;
        log_statement(self.log_statements, &statement);
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        run_select(&mut **tx, &statement).await
    }

    async fn insert(&self, table: &str, primary_key: &str, rows: Vec<Record>) -> ModelResult<Vec<Value>> {
        self.stats.record_insert();
        let statement = insert_sql(table, primary_key, &rows);
        log_statement(self.log_statements, &statement);
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        run_insert(&mut **tx, &statement, primary_key).await
    }

    async fn update(&self, table: &str, values: Record, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_update();
        let statement = update_sql(table, &values, predicates);
        log_statement(self.log_statements, &statement);
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        run_execute(&mut **tx, &statement).await
    }

    async fn delete(&self, table: &str, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_delete();
        let statement = delete_sql(table, predicates);
        log_statement(self.log_statements, &statement);
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        run_execute(&mut **tx, &statement).await
    }

    async fn begin(&self) -> ModelResult<Box<dyn TransactionScope>> {
        Err(ModelError::Transaction(
            "Nested transactions are not supported".to_string(),
        ))
    }
}

#[async_trait]
impl TransactionScope for PostgresTransaction {
    async fn commit(&self) -> ModelResult<()> {
        let tx = self.tx.lock().await.take().ok_or_else(finished)?;
        tx.commit()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to commit transaction: {}", e)))?;
        tracing::debug!("postgres: transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> ModelResult<()> {
        let tx = self.tx.lock().await.take().ok_or_else(finished)?;
        tx.rollback()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to rollback transaction: {}", e)))?;
        tracing::debug!("postgres: transaction rolled back");
        Ok(())
    }
}
