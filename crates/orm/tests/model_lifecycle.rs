//! Lifecycle behaviour against the in-memory adapter: round trips,
//! mass-assignment, timestamps, bulk atomicity and lookup failures.

use std::time::Duration;

use async_trait::async_trait;
use elif_record::prelude::*;
use elif_record::{BroadcastDispatcher, ModelEventKind, Operation};
use serde_json::{json, Value};

struct Order;

#[async_trait]
impl Entity for Order {
    fn table_name() -> &'static str {
        "orders"
    }

    fn entity_name() -> &'static str {
        "order"
    }

    fn columns() -> &'static [&'static str] {
        &[
            "id",
            "uuid",
            "name",
            "status",
            "code",
            "internal_note",
            "created_at",
            "updated_at",
        ]
    }

    fn fillable() -> &'static [&'static str] {
        &["name", "status", "code", "internal_note"]
    }

    fn guarded() -> &'static [&'static str] {
        &["internal_note"]
    }

    async fn set_attributes(attributes: &mut Record) -> ModelResult<()> {
        if let Some(Value::String(status)) = attributes.get_mut("status") {
            *status = status.to_lowercase();
        }
        Ok(())
    }
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn database() -> (Database, MemoryAdapter) {
    let adapter = MemoryAdapter::new()
        .with_table(TableDefinition::new("orders").unique("code"))
        .unwrap();
    (Database::new(adapter.clone()), adapter)
}

#[tokio::test]
async fn created_rows_round_trip_through_persistence() {
    let (db, _) = database();
    let payloads = vec![
        json!({"name": "Alpha", "status": "active", "code": "A-1"}),
        json!({"name": "Beta", "status": "pending", "code": "B-2"}),
        json!({"name": "Gamma", "status": "closed", "code": null}),
    ];

    for payload in payloads {
        let created = Model::<Order>::create(&db, record(payload)).await.unwrap();
        let fetched = Model::<Order>::find_or_fail(&db, created.id().cloned().unwrap())
            .await
            .unwrap();

        for column in Order::fillable().iter().filter(|c| !Order::guarded().contains(c)) {
            assert_eq!(fetched.get(column), created.get(column), "column {column}");
        }
        assert_eq!(fetched.to_json(), created.to_json());
    }
}

#[tokio::test]
async fn guarded_column_is_never_persisted_by_mass_assignment() {
    let (db, adapter) = database();
    let order = Model::<Order>::create(
        &db,
        record(json!({"name": "Alpha", "internal_note": "do not store"})),
    )
    .await
    .unwrap();
    assert!(order.get("internal_note").is_none());

    let mut order = order;
    order
        .update(&db, record(json!({"internal_note": "still no"})))
        .await
        .unwrap();

    let rows = adapter.rows("orders").await;
    assert!(rows.iter().all(|row| !row.contains_key("internal_note")));
}

#[tokio::test]
async fn update_changes_status_and_advances_updated_at_only() {
    let (db, _) = database();
    let mut order = Model::<Order>::create(&db, record(json!({"name": "Alpha", "status": "active"})))
        .await
        .unwrap();
    let id = order.id().cloned().unwrap();
    let created_at = order.get("created_at").unwrap();
    let updated_at = order.get("updated_at").unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    order
        .update(&db, record(json!({"status": "inactive"})))
        .await
        .unwrap();

    let fetched = Model::<Order>::find(&db, id).await.unwrap().unwrap();
    assert_eq!(fetched.get("status"), Some(json!("inactive")));
    assert_eq!(fetched.get("created_at"), Some(created_at));

    let advanced = fetched.get("updated_at").unwrap();
    assert!(advanced.as_str().unwrap() > updated_at.as_str().unwrap());
}

#[tokio::test]
async fn bulk_store_commits_nothing_when_one_row_fails() {
    let adapter = MemoryAdapter::new()
        .with_table(TableDefinition::new("orders").unique("code"))
        .unwrap();
    let dispatcher = BroadcastDispatcher::new(16);
    let mut events = dispatcher.subscribe();
    let db = Database::new(adapter.clone()).with_dispatcher(dispatcher);

    let result = Model::<Order>::bulk_store(
        &db,
        vec![
            record(json!({"name": "A", "code": "X-1"})),
            record(json!({"name": "B", "code": "X-2"})),
            record(json!({"name": "C", "code": "X-1"})),
        ],
    )
    .await;

    match result {
        Err(ModelError::Persistence { operation, .. }) => assert_eq!(operation, Operation::Create),
        other => panic!("expected a persistence error, got {other:?}"),
    }
    assert!(adapter.rows("orders").await.is_empty());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn bulk_store_dispatches_after_commit() {
    let adapter = MemoryAdapter::new();
    let dispatcher = BroadcastDispatcher::new(16);
    let mut events = dispatcher.subscribe();
    let db = Database::new(adapter.clone()).with_dispatcher(dispatcher);

    let stored = Model::<Order>::bulk_store(
        &db,
        vec![record(json!({"name": "A"})), record(json!({"name": "B"}))],
    )
    .await
    .unwrap();

    assert_eq!(stored, 2);
    for _ in 0..2 {
        let event = events.try_recv().unwrap();
        assert_eq!(event.name, "order:created");
        assert_eq!(event.kind, ModelEventKind::Created);
    }
}

#[tokio::test]
async fn empty_bulk_calls_touch_nothing() {
    let (db, adapter) = database();

    assert!(Model::<Order>::create_many(&db, Vec::new()).await.unwrap().is_empty());
    assert_eq!(Model::<Order>::bulk_store(&db, Vec::new()).await.unwrap(), 0);
    assert_eq!(Model::<Order>::bulk_destroy(&db, Vec::<i64>::new()).await.unwrap(), 0);
    assert_eq!(Model::<Order>::bulk_soft_delete(&db, Vec::<i64>::new()).await.unwrap(), 0);

    assert_eq!(adapter.stats().snapshot().total(), 0);
}

#[tokio::test]
async fn find_or_fail_on_empty_table_is_not_found() {
    let (db, _) = database();

    let error = Model::<Order>::find_or_fail(&db, 9999).await.unwrap_err();
    assert!(error.is_not_found());
    assert!(matches!(
        error,
        ModelError::NotFound { ref entity, ref key } if entity == "order" && key.as_deref() == Some("9999")
    ));

    assert!(Model::<Order>::find(&db, 9999).await.unwrap().is_none());
    assert!(Model::<Order>::first_or_fail(&db).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn setters_run_on_create_and_update() {
    let (db, _) = database();
    let mut order = Model::<Order>::create(&db, record(json!({"name": "A", "status": "ACTIVE"})))
        .await
        .unwrap();
    assert_eq!(order.get("status"), Some(json!("active")));

    order
        .update(&db, record(json!({"status": "Closed"})))
        .await
        .unwrap();
    assert_eq!(order.get("status"), Some(json!("closed")));
}

#[tokio::test]
async fn changed_primary_key_never_redirects_writes() {
    let (db, adapter) = database();
    for name in ["first", "second", "third", "fourth"] {
        Model::<Order>::create(&db, record(json!({"name": name}))).await.unwrap();
    }

    let mut order = Model::<Order>::find_or_fail(&db, 1).await.unwrap();
    order.set("id", 2).set("name", "renamed");
    order.save(&db).await.unwrap();

    assert_eq!(order.id(), Some(&json!(1)));
    let first = Model::<Order>::find_or_fail(&db, 1).await.unwrap();
    let second = Model::<Order>::find_or_fail(&db, 2).await.unwrap();
    assert_eq!(first.get("name"), Some(json!("renamed")));
    assert_eq!(second.get("name"), Some(json!("second")));

    let mut third = Model::<Order>::find_or_fail(&db, 3).await.unwrap();
    third.set("id", 4);
    assert_eq!(third.delete(&db).await.unwrap(), 1);

    assert!(Model::<Order>::find(&db, 3).await.unwrap().is_none());
    assert!(Model::<Order>::find(&db, 4).await.unwrap().is_some());
    assert_eq!(adapter.rows("orders").await.len(), 3);
}
