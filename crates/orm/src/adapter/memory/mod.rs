//! In-memory execution engine
//!
//! Tables are created on first insert. Each table assigns auto-increment
//! integer ids and enforces the unique columns declared through
//! `TableDefinition`. A transaction holds the store lock until it commits or
//! rolls back, so while one is open every other call on the same adapter
//! waits; code running inside `Database::transaction` must use the scoped
//! handle it is given.

mod evaluate;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::statistics::AdapterStats;
use super::{ExecutionAdapter, TransactionScope};
use crate::attributes::{value_key, Record};
use crate::error::{ModelError, ModelResult};
use crate::query::{Predicate, QueryState};

/// Table options for the memory engine
#[derive(Debug, Clone)]
pub struct TableDefinition {
    name: String,
    unique: Vec<String>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unique: Vec::new(),
        }
    }

    /// Reject rows whose value in `column` is already taken
    pub fn unique(mut self, column: &str) -> Self {
        self.unique.push(column.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct MemoryTable {
    rows: Vec<Record>,
    next_id: i64,
    unique: Vec<String>,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
            unique: Vec::new(),
        }
    }
}

impl MemoryTable {
    fn check_unique(&self, table: &str, primary_key: Option<&str>, rows: &[Record]) -> ModelResult<()> {
        let columns = primary_key
            .into_iter()
            .chain(self.unique.iter().map(String::as_str));
        for column in columns {
            let mut seen = std::collections::HashSet::new();
            for row in rows {
                if let Some(key) = row.get(column).and_then(value_key) {
                    if !seen.insert(key.clone()) {
                        return Err(ModelError::Database(format!(
                            "duplicate key value violates unique constraint \"{}_{}_key\": ({})=({})",
                            table, column, column, key
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
}

impl MemoryStore {
    fn select(&self, state: &QueryState) -> ModelResult<Vec<Record>> {
        match self.tables.get(state.table()) {
            Some(table) => evaluate::select(&table.rows, state),
            None => Ok(Vec::new()),
        }
    }

    fn insert(&mut self, table: &str, primary_key: &str, rows: Vec<Record>) -> ModelResult<Vec<Value>> {
        let target = self.tables.entry(table.to_string()).or_default();
        let mut next_id = target.next_id;
        let mut ids = Vec::with_capacity(rows.len());
        let mut prepared = Vec::with_capacity(rows.len());

        for mut row in rows {
            let id = match row.get(primary_key) {
                Some(Value::Null) | None => {
                    let id = Value::from(next_id);
                    next_id += 1;
                    row.insert(primary_key.to_string(), id.clone());
                    id
                }
                Some(given) => {
                    if let Some(explicit) = given.as_i64() {
                        next_id = next_id.max(explicit + 1);
                    }
                    given.clone()
                }
            };
            ids.push(id);
            prepared.push(row);
        }

        let mut candidate = target.rows.clone();
        candidate.extend(prepared);
        target.check_unique(table, Some(primary_key), &candidate)?;

        target.rows = candidate;
        target.next_id = next_id;
        Ok(ids)
    }

    fn update(&mut self, table: &str, values: &Record, predicates: &[Predicate]) -> ModelResult<u64> {
        let Some(target) = self.tables.get_mut(table) else {
            return Ok(0);
        };

        let mut candidate = target.rows.clone();
        let mut affected = 0;
        for row in candidate.iter_mut() {
            if evaluate::matches_all(row, table, predicates)? {
                for (column, value) in values {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }

        if affected > 0 {
            target.check_unique(table, None, &candidate)?;
            target.rows = candidate;
        }
        Ok(affected)
    }

    fn delete(&mut self, table: &str, predicates: &[Predicate]) -> ModelResult<u64> {
        let Some(target) = self.tables.get_mut(table) else {
            return Ok(0);
        };

        let mut doomed = Vec::with_capacity(target.rows.len());
        for row in &target.rows {
            doomed.push(evaluate::matches_all(row, table, predicates)?);
        }

        let affected = doomed.iter().filter(|d| **d).count() as u64;
        let mut flags = doomed.into_iter();
        target.rows.retain(|_| !flags.next().unwrap_or(false));
        Ok(affected)
    }
}

fn log_statement(enabled: bool, operation: &str, table: &str) {
    if enabled {
        tracing::debug!("memory adapter: {} on '{}'", operation, table);
    }
}

/// In-process `ExecutionAdapter`
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Arc<Mutex<MemoryStore>>,
    stats: Arc<AdapterStats>,
    log_statements: bool,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table and its unique columns up front.
    ///
    /// Fails when a clone of this adapter holds the store in an open
    /// transaction.
    pub fn with_table(mut self, definition: TableDefinition) -> ModelResult<Self> {
        let TableDefinition { name, unique } = definition;
        match Arc::get_mut(&mut self.store) {
            Some(store) => store.get_mut().tables.entry(name).or_default().unique = unique,
            None => {
                let mut store = self.store.try_lock().map_err(|_| {
                    ModelError::Configuration(format!(
                        "Cannot declare table '{}' while a transaction holds the store",
                        name
                    ))
                })?;
                store.tables.entry(name).or_default().unique = unique;
            }
        }
        Ok(self)
    }

    /// Emit a `debug!` line per statement
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Statement counters, shared with every transaction this adapter opens
    pub fn stats(&self) -> &AdapterStats {
        &self.stats
    }

    /// Copy of every row currently committed to `table`
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        let store = self.store.lock().await;
        store
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionAdapter for MemoryAdapter {
    async fn select(&self, state: &QueryState) -> ModelResult<Vec<Record>> {
        self.stats.record_select();
        log_statement(self.log_statements, "select", state.table());
        self.store.lock().await.select(state)
    }

    async fn insert(&self, table: &str, primary_key: &str, rows: Vec<Record>) -> ModelResult<Vec<Value>> {
        self.stats.record_insert();
        log_statement(self.log_statements, "insert", table);
        self.store.lock().await.insert(table, primary_key, rows)
    }

    async fn update(&self, table: &str, values: Record, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_update();
        log_statement(self.log_statements, "update", table);
        self.store.lock().await.update(table, &values, predicates)
    }

    async fn delete(&self, table: &str, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_delete();
        log_statement(self.log_statements, "delete", table);
        self.store.lock().await.delete(table, predicates)
    }

    async fn begin(&self) -> ModelResult<Box<dyn TransactionScope>> {
        self.stats.record_transaction();
        let guard = self.store.clone().lock_owned().await;
        let working = guard.clone();
        tracing::debug!("memory adapter: transaction started");
        Ok(Box::new(MemoryTransaction {
            state: Mutex::new(Some(OpenTransaction { guard, working })),
            stats: self.stats.clone(),
            log_statements: self.log_statements,
        }))
    }
}

struct OpenTransaction {
    guard: OwnedMutexGuard<MemoryStore>,
    working: MemoryStore,
}

/// Transaction scope over a working copy of the store
pub struct MemoryTransaction {
    state: Mutex<Option<OpenTransaction>>,
    stats: Arc<AdapterStats>,
    log_statements: bool,
}

fn finished() -> ModelError {
    ModelError::Transaction("Transaction already finished".to_string())
}

#[async_trait]
impl ExecutionAdapter for MemoryTransaction {
    async fn select(&self, state: &QueryState) -> ModelResult<Vec<Record>> {
        self.stats.record_select();
        log_statement(self.log_statements, "select", state.table());
        let guard = self.state.lock().await;
        let open = guard.as_ref().ok_or_else(finished)?;
        open.working.select(state)
    }

    async fn insert(&self, table: &str, primary_key: &str, rows: Vec<Record>) -> ModelResult<Vec<Value>> {
        self.stats.record_insert();
        log_statement(self.log_statements, "insert", table);
        let mut guard = self.state.lock().await;
        let open = guard.as_mut().ok_or_else(finished)?;
        open.working.insert(table, primary_key, rows)
    }

    async fn update(&self, table: &str, values: Record, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_update();
        log_statement(self.log_statements, "update", table);
        let mut guard = self.state.lock().await;
        let open = guard.as_mut().ok_or_else(finished)?;
        open.working.update(table, &values, predicates)
    }

    async fn delete(&self, table: &str, predicates: &[Predicate]) -> ModelResult<u64> {
        self.stats.record_delete();
        log_statement(self.log_statements, "delete", table);
        let mut guard = self.state.lock().await;
        let open = guard.as_mut().ok_or_else(finished)?;
        open.working.delete(table, predicates)
    }

    async fn begin(&self) -> ModelResult<Box<dyn TransactionScope>> {
        Err(ModelError::Transaction(
            "Nested transactions are not supported".to_string(),
        ))
    }
}

#[async_trait]
impl TransactionScope for MemoryTransaction {
    async fn commit(&self) -> ModelResult<()> {
        let open = self.state.lock().await.take().ok_or_else(finished)?;
        let OpenTransaction { mut guard, working } = open;
        *guard = working;
        tracing::debug!("memory adapter: transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> ModelResult<()> {
        self.state.lock().await.take().ok_or_else(finished)?;
        tracing::debug!("memory adapter: transaction rolled back");
        Ok(())
    }
}
