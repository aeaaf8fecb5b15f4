//! Database handle - adapter, event dispatcher and configuration in one
//! cheaply clonable value, plus transaction scoping.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::adapter::{ExecutionAdapter, TransactionScope};
use crate::attributes::Record;
use crate::config::OrmConfig;
use crate::error::{ModelError, ModelResult};
use crate::events::{EventDispatcher, ModelEvent, NullDispatcher};
use crate::query::{Predicate, QueryState};

/// Entry point for every query and lifecycle operation
#[derive(Clone)]
pub struct Database {
    adapter: Arc<dyn ExecutionAdapter>,
    dispatcher: Arc<dyn EventDispatcher>,
    config: Arc<OrmConfig>,
    /// Events raised inside a transaction wait here until commit
    pending: Option<Arc<Mutex<Vec<ModelEvent>>>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl Database {
    pub fn new<A: ExecutionAdapter + 'static>(adapter: A) -> Self {
        Self::from_adapter(Arc::new(adapter))
    }

    pub fn from_adapter(adapter: Arc<dyn ExecutionAdapter>) -> Self {
        Self {
            adapter,
            dispatcher: Arc::new(NullDispatcher),
            config: Arc::new(OrmConfig::default()),
            pending: None,
        }
    }

    pub fn with_dispatcher<D: EventDispatcher + 'static>(mut self, dispatcher: D) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    pub fn with_config(mut self, config: OrmConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn adapter(&self) -> &dyn ExecutionAdapter {
        self.adapter.as_ref()
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// Check if this handle is bound to an open transaction scope
    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    /// Hand an event to the dispatcher, or hold it until the enclosing
    /// transaction commits.
    pub async fn dispatch(&self, event: ModelEvent) {
        match &self.pending {
            Some(pending) => pending.lock().await.push(event),
            None => self.dispatcher.dispatch(event).await,
        }
    }

    /// Run `work` inside one atomic scope.
    ///
    /// `work` receives a handle bound to the scope and must issue every
    /// statement through it. `Ok` commits and then dispatches the buffered
    /// events; `Err` rolls back and drops them. Called on a handle that is
    /// already in a transaction, `work` joins the enclosing scope.
    pub async fn transaction<F, Fut, T>(&self, work: F) -> ModelResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = ModelResult<T>>,
    {
        if self.in_transaction() {
            return work(self.clone()).await;
        }

        let scope: Arc<dyn TransactionScope> = Arc::from(self.adapter.begin().await?);
        let pending = Arc::new(Mutex::new(Vec::new()));
        let scoped = Database {
            adapter: Arc::new(ScopedAdapter {
                scope: scope.clone(),
            }),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
            pending: Some(pending.clone()),
        };
        tracing::debug!("Transaction started");

        match work(scoped).await {
            Ok(value) => {
                scope.commit().await?;
                tracing::debug!("Transaction committed");
                let events = std::mem::take(&mut *pending.lock().await);
                for event in events {
                    self.dispatcher.dispatch(event).await;
                }
                Ok(value)
            }
            Err(error) => {
                tracing::warn!("Rolling back transaction: {}", error);
                if let Err(rollback_error) = scope.rollback().await {
                    tracing::warn!("Failed to roll back transaction: {}", rollback_error);
                }
                Err(error)
            }
        }
    }
}

/// Presents a transaction scope as a plain adapter
struct ScopedAdapter {
    scope: Arc<dyn TransactionScope>,
}

#[async_trait]
impl ExecutionAdapter for ScopedAdapter {
    async fn select(&self, state: &QueryState) -> ModelResult<Vec<Record>> {
        self.scope.select(state).await
    }

    async fn insert(&self, table: &str, primary_key: &str, rows: Vec<Record>) -> ModelResult<Vec<Value>> {
        self.scope.insert(table, primary_key, rows).await
    }

    async fn update(&self, table: &str, values: Record, predicates: &[Predicate]) -> ModelResult<u64> {
        self.scope.update(table, values, predicates).await
    }

    async fn delete(&self, table: &str, predicates: &[Predicate]) -> ModelResult<u64> {
        self.scope.delete(table, predicates).await
    }

    async fn begin(&self) -> ModelResult<Box<dyn TransactionScope>> {
        Err(ModelError::Transaction(
            "Nested transactions are not supported".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::events::BroadcastDispatcher;
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_commit_flushes_buffered_events() {
        let adapter = MemoryAdapter::new();
        let dispatcher = BroadcastDispatcher::new(8);
        let mut events = dispatcher.subscribe();
        let db = Database::new(adapter.clone()).with_dispatcher(dispatcher);

        db.transaction(|tx| async move {
            tx.adapter().insert("routes", "id", vec![row(json!({"name": "A"}))]).await?;
            tx.dispatch(ModelEvent::created("routes", Record::new())).await;
            assert!(tx.in_transaction());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(events.try_recv().unwrap().name, "routes:created");
        assert_eq!(adapter.rows("routes").await.len(), 1);
    }

    #[tokio::test]
    async fn test_error_rolls_back_and_drops_events() {
        let adapter = MemoryAdapter::new();
        let dispatcher = BroadcastDispatcher::new(8);
        let mut events = dispatcher.subscribe();
        let db = Database::new(adapter.clone()).with_dispatcher(dispatcher);

        let result: ModelResult<()> = db
            .transaction(|tx| async move {
                tx.adapter().insert("routes", "id", vec![row(json!({"name": "A"}))]).await?;
                tx.dispatch(ModelEvent::created("routes", Record::new())).await;
                Err(ModelError::Query("boom".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(events.try_recv().is_err());
        assert!(adapter.rows("routes").await.is_empty());
    }

    #[tokio::test]
    async fn test_nested_transaction_joins_outer_scope() {
        let adapter = MemoryAdapter::new();
        let db = Database::new(adapter.clone());

        db.transaction(|tx| async move {
            tx.transaction(|inner| async move {
                inner.adapter().insert("routes", "id", vec![row(json!({"name": "A"}))]).await?;
                Ok(())
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(adapter.stats().snapshot().transactions, 1);
        assert_eq!(adapter.rows("routes").await.len(), 1);
    }
}
