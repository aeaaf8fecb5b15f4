//! CRUD Operations - single-row lifecycle of a model
//!
//! Transient (no primary key) to persisted, through create/save, with
//! update, delete and soft delete on persisted rows. Every write re-selects
//! the row so the instance reflects what the engine stored, and dispatches
//! its lifecycle event only after the adapter confirmed the write.

use serde_json::Value;

use super::entity::Entity;
use super::mass_assignment::{self, prepare_insert, prepare_update, timestamp};
use super::Model;
use crate::attributes::{value_key, Record};
use crate::database::Database;
use crate::error::{ModelError, ModelResult, Operation};
use crate::events::ModelEvent;
use crate::query::{Predicate, QueryBuilder};
use crate::validation::Payload;

impl<E: Entity> Model<E> {
    /// Create a row from a mass-assignment payload.
    ///
    /// Only fillable, unguarded columns survive; setters, uuid and
    /// timestamps are applied before the insert.
    pub async fn create(db: &Database, payload: Record) -> ModelResult<Self> {
        let attributes = mass_assignment::fillable::<E>(payload);
        Self::insert_attributes(db, attributes).await
    }

    /// Create a row without fillable/guarded filtering
    pub async fn force_create(db: &Database, attributes: Record) -> ModelResult<Self> {
        Self::insert_attributes(db, attributes).await
    }

    /// Validate `payload` first, then create from its data
    pub async fn create_validated<P: Payload>(db: &Database, payload: P) -> ModelResult<Self> {
        payload.validate()?;
        Self::create(db, payload.into_record()).await
    }

    async fn insert_attributes(db: &Database, mut attributes: Record) -> ModelResult<Self> {
        let inserted = async {
            E::set_attributes(&mut attributes).await?;
            prepare_insert::<E>(&mut attributes);

            let ids = db
                .adapter()
                .insert(E::table_name(), E::primary_key_name(), vec![attributes])
                .await?;
            let id = ids.into_iter().next().ok_or_else(|| {
                ModelError::Database("Insert returned no primary key".to_string())
            })?;

            Self::fetch(db, &id).await
        }
        .await
        .map_err(|e| Self::persistence_error(e, Operation::Create))?;

        tracing::debug!("Created {} {:?}", E::entity_name(), inserted.id());
        db.dispatch(ModelEvent::created(
            E::entity_name(),
            inserted.attributes().snapshot(),
        ))
        .await;
        Ok(inserted)
    }

    /// Mass-assign `payload` onto the stored row.
    ///
    /// A transient instance has nothing to update: the call is a no-op and
    /// returns `Ok(None)`.
    pub async fn update(&mut self, db: &Database, payload: Record) -> ModelResult<Option<&Self>> {
        let values = mass_assignment::fillable::<E>(payload);
        self.write_update(db, values, Operation::Update).await
    }

    /// Update without fillable/guarded filtering
    pub async fn force_update(&mut self, db: &Database, values: Record) -> ModelResult<Option<&Self>> {
        self.write_update(db, values, Operation::Update).await
    }

    async fn write_update(
        &mut self,
        db: &Database,
        mut values: Record,
        operation: Operation,
    ) -> ModelResult<Option<&Self>> {
        let id = match self.stored_key() {
            Some(id) => id,
            None => {
                tracing::debug!(
                    "Skipping {} of {}: instance has no primary key",
                    operation,
                    E::entity_name()
                );
                return Ok(None);
            }
        };

        let fresh = async {
            E::set_attributes(&mut values).await?;
            prepare_update::<E>(&mut values);

            let written = !values.is_empty();
            if written {
                db.adapter()
                    .update(
                        E::table_name(),
                        values,
                        &[Predicate::eq(E::primary_key_name(), id.clone())],
                    )
                    .await?;
            }

            Ok::<_, ModelError>((Self::fetch(db, &id).await?, written))
        }
        .await
        .map_err(|e| Self::persistence_error(e, operation))?;

        let (fresh, written) = fresh;
        self.replace_attributes(fresh);
        if written {
            db.dispatch(ModelEvent::updated(
                E::entity_name(),
                self.attributes().snapshot(),
            ))
            .await;
        } else {
            tracing::debug!("Nothing to write for {} {}", E::entity_name(), id);
        }
        Ok(Some(&*self))
    }

    /// Persist the instance whatever its state.
    ///
    /// A persisted instance writes only its dirty columns and does nothing
    /// when none changed; a transient one inserts what was set on it.
    pub async fn save(&mut self, db: &Database) -> ModelResult<()> {
        if self.is_persisted() {
            let dirty = self.dirty();
            if dirty.is_empty() {
                tracing::debug!("Nothing to save for {} {:?}", E::entity_name(), self.id());
                return Ok(());
            }
            self.write_update(db, dirty, Operation::Update).await?;
        } else {
            let created = Self::insert_attributes(db, self.attributes().current().clone()).await?;
            self.replace_attributes(created);
        }
        Ok(())
    }

    /// Hard-delete the row; returns the number of rows removed.
    ///
    /// The `deleted` event carries the row as it was before the delete.
    pub async fn delete(self, db: &Database) -> ModelResult<u64> {
        let id = self.stored_key().ok_or(ModelError::MissingPrimaryKey)?;
        let snapshot = self.attributes().snapshot();

        let deleted = db
            .adapter()
            .delete(
                E::table_name(),
                &[Predicate::eq(E::primary_key_name(), id)],
            )
            .await
            .map_err(|e| Self::persistence_error(e, Operation::Delete))?;

        if deleted > 0 {
            db.dispatch(ModelEvent::deleted(E::entity_name(), snapshot)).await;
        }
        Ok(deleted)
    }

    /// Delete the row with primary key `id`, if it exists
    pub async fn remove<V: Into<Value>>(db: &Database, id: V) -> ModelResult<u64> {
        let id = id.into();
        match QueryBuilder::<E>::new().find(db, id.clone()).await? {
            Some(model) => model.delete(db).await,
            None => {
                tracing::debug!("No {} to remove for key {}", E::entity_name(), id);
                Ok(0)
            }
        }
    }

    /// Reload the attributes from the stored row
    pub async fn refresh(&mut self, db: &Database) -> ModelResult<()> {
        let id = self.stored_key().ok_or(ModelError::MissingPrimaryKey)?;
        let fresh = Self::fetch(db, &id).await?;
        self.replace_attributes(fresh);
        Ok(())
    }

    /// Stamp the entity's soft-delete column with the current time
    pub async fn soft_delete(&mut self, db: &Database) -> ModelResult<()> {
        let column = soft_delete_column::<E>()?;
        if !self.is_persisted() {
            return Err(ModelError::MissingPrimaryKey);
        }

        let mut values = Record::new();
        values.insert(column.to_string(), timestamp());
        self.write_update(db, values, Operation::SoftDelete).await?;
        Ok(())
    }

    /// First row matching every `search` pair, or a new one created from
    /// `search` merged with `values`
    pub async fn first_or_create(db: &Database, search: Record, values: Record) -> ModelResult<Self> {
        if let Some(found) = Self::search(&search).first(db).await? {
            return Ok(found);
        }

        let mut payload = search;
        payload.extend(values);
        Self::create(db, payload).await
    }

    /// Like `first_or_create`, but a found row also gets `values` applied
    pub async fn update_or_create(db: &Database, search: Record, values: Record) -> ModelResult<Self> {
        match Self::search(&search).first(db).await? {
            Some(mut found) => {
                found.update(db, values).await?;
                Ok(found)
            }
            None => {
                let mut payload = search;
                payload.extend(values);
                Self::create(db, payload).await
            }
        }
    }

    fn search(search: &Record) -> QueryBuilder<E> {
        search
            .iter()
            .fold(QueryBuilder::new(), |query, (column, value)| {
                query.where_eq(column, value.clone())
            })
    }

    /// Key of the row this instance was loaded from.
    ///
    /// A primary key changed through `set` never redirects a write to
    /// another row.
    fn stored_key(&self) -> Option<Value> {
        self.attributes()
            .original_value(E::primary_key_name())
            .filter(|id| !id.is_null())
            .or_else(|| self.id())
            .cloned()
    }

    /// Re-select a row by primary key; a vanished row is `NotFound`
    async fn fetch(db: &Database, id: &Value) -> ModelResult<Self> {
        QueryBuilder::<E>::new()
            .find(db, id.clone())
            .await?
            .ok_or_else(|| ModelError::not_found(E::entity_name(), value_key(id)))
    }

    pub(crate) fn persistence_error(error: ModelError, operation: Operation) -> ModelError {
        let error = error.into_persistence(E::entity_name(), operation);
        tracing::error!("{}", error);
        error
    }
}

pub(crate) fn soft_delete_column<E: Entity>() -> ModelResult<&'static str> {
    E::soft_delete_column().ok_or_else(|| {
        ModelError::Configuration(format!(
            "{} does not declare a soft delete column",
            E::entity_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryAdapter, TableDefinition};
    use crate::events::{BroadcastDispatcher, ModelEventKind};
    use crate::tests::{record, Route, Zone};
    use crate::validation::{RequestPayload, Rules};
    use serde_json::json;

    fn database() -> (Database, MemoryAdapter) {
        let adapter = MemoryAdapter::new()
            .with_table(TableDefinition::new("routes").unique("code"))
            .unwrap();
        (Database::new(adapter.clone()), adapter)
    }

    #[tokio::test]
    async fn test_create_filters_and_stamps() {
        let (db, _) = database();
        let route = Model::<Route>::create(
            &db,
            record(json!({"name": "  Alpha ", "status": "active", "secret": "x"})),
        )
        .await
        .unwrap();

        assert_eq!(route.id(), Some(&json!(1)));
        assert_eq!(route.get("name"), Some(json!("Alpha")));
        assert!(route.get("secret").is_none());
        assert!(route.get("uuid").is_some());
        assert_eq!(route.get("created_at"), route.get("updated_at"));
        assert!(!route.is_dirty());
    }

    #[tokio::test]
    async fn test_create_dispatches_created_event() {
        let adapter = MemoryAdapter::new();
        let dispatcher = BroadcastDispatcher::new(8);
        let mut events = dispatcher.subscribe();
        let db = Database::new(adapter).with_dispatcher(dispatcher);

        Model::<Route>::create(&db, record(json!({"name": "Alpha"})))
            .await
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.name, "routes:created");
        assert_eq!(event.payload["name"], json!("Alpha"));
    }

    #[tokio::test]
    async fn test_force_create_keeps_guarded_columns() {
        let (db, _) = database();
        let route = Model::<Route>::force_create(&db, record(json!({"name": "Alpha", "secret": "s"})))
            .await
            .unwrap();
        assert_eq!(route.get("secret"), Some(json!("s")));
    }

    #[tokio::test]
    async fn test_adapter_rejection_becomes_persistence_error() {
        let (db, _) = database();
        Model::<Route>::create(&db, record(json!({"name": "A", "code": "x"})))
            .await
            .unwrap();
        let error = Model::<Route>::create(&db, record(json!({"name": "B", "code": "x"})))
            .await
            .unwrap_err();

        match error {
            ModelError::Persistence { entity, operation, message } => {
                assert_eq!(entity, "routes");
                assert_eq!(operation, Operation::Create);
                assert!(message.contains("unique"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_on_transient_instance_is_a_no_op() {
        let (db, adapter) = database();
        let mut route = Model::<Route>::new();
        let result = route.update(&db, record(json!({"name": "A"}))).await.unwrap();
        assert!(result.is_none());
        assert_eq!(adapter.stats().snapshot().total(), 0);
    }

    #[tokio::test]
    async fn test_update_ignores_guarded_and_primary_key() {
        let (db, _) = database();
        let mut route = Model::<Route>::create(&db, record(json!({"name": "A"})))
            .await
            .unwrap();

        route
            .update(&db, record(json!({"name": "B", "secret": "s", "id": 42})))
            .await
            .unwrap();
        assert_eq!(route.id(), Some(&json!(1)));
        assert_eq!(route.get("name"), Some(json!("B")));
        assert!(route.get("secret").is_none());
    }

    #[tokio::test]
    async fn test_save_inserts_then_writes_only_dirty_columns() {
        let (db, adapter) = database();
        let mut route = Model::<Route>::new();
        route.set("name", "Alpha").set("status", "active");
        route.save(&db).await.unwrap();
        assert!(route.is_persisted());

        let before = adapter.stats().snapshot();
        route.save(&db).await.unwrap();
        assert_eq!(adapter.stats().snapshot(), before);

        route.set("status", "idle");
        route.save(&db).await.unwrap();
        assert_eq!(adapter.stats().snapshot().updates, before.updates + 1);
        assert_eq!(route.get("status"), Some(json!("idle")));
        assert!(!route.is_dirty());
    }

    #[tokio::test]
    async fn test_update_that_writes_nothing_dispatches_nothing() {
        let adapter = MemoryAdapter::new();
        let dispatcher = BroadcastDispatcher::new(8);
        let mut events = dispatcher.subscribe();
        let db = Database::new(adapter.clone()).with_dispatcher(dispatcher);

        let mut zone = Model::<Zone>::create(&db, record(json!({"name": "North"})))
            .await
            .unwrap();
        let _ = events.try_recv();

        let before = adapter.stats().snapshot();
        let result = zone.update(&db, record(json!({"id": 9, "bogus": true}))).await.unwrap();
        assert!(result.is_some());
        assert_eq!(adapter.stats().snapshot().updates, before.updates);
        assert!(events.try_recv().is_err());

        zone.update(&db, record(json!({"name": "South"}))).await.unwrap();
        assert_eq!(events.try_recv().unwrap().kind, ModelEventKind::Updated);
    }

    #[tokio::test]
    async fn test_delete_requires_primary_key() {
        let (db, _) = database();
        let error = Model::<Route>::new().delete(&db).await.unwrap_err();
        assert!(matches!(error, ModelError::MissingPrimaryKey));
    }

    #[tokio::test]
    async fn test_remove_dispatches_snapshot_once() {
        let adapter = MemoryAdapter::new();
        let dispatcher = BroadcastDispatcher::new(8);
        let mut events = dispatcher.subscribe();
        let db = Database::new(adapter.clone()).with_dispatcher(dispatcher);

        let route = Model::<Route>::create(&db, record(json!({"name": "A"})))
            .await
            .unwrap();
        let _ = events.try_recv();

        let id = route.id().cloned().unwrap();
        assert_eq!(Model::<Route>::remove(&db, id.clone()).await.unwrap(), 1);
        assert_eq!(Model::<Route>::remove(&db, id).await.unwrap(), 0);

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, ModelEventKind::Deleted);
        assert_eq!(event.payload["name"], json!("A"));
        assert!(events.try_recv().is_err());
        assert!(adapter.rows("routes").await.is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_stamps_column() {
        let (db, _) = database();
        let mut route = Model::<Route>::create(&db, record(json!({"name": "A"})))
            .await
            .unwrap();
        route.soft_delete(&db).await.unwrap();
        assert!(route.get("deleted_at").map_or(false, |v| v.is_string()));

        let mut zone = Model::<Zone>::create(&db, record(json!({"name": "North"})))
            .await
            .unwrap();
        let error = zone.soft_delete(&db).await.unwrap_err();
        assert!(matches!(error, ModelError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_refresh_reloads_stored_values() {
        let (db, _) = database();
        let mut route = Model::<Route>::create(&db, record(json!({"name": "A"})))
            .await
            .unwrap();
        route.set("name", "unsaved");
        route.refresh(&db).await.unwrap();
        assert_eq!(route.get("name"), Some(json!("A")));
    }

    #[tokio::test]
    async fn test_first_or_create_and_update_or_create() {
        let (db, adapter) = database();
        let first = Model::<Route>::first_or_create(
            &db,
            record(json!({"name": "A"})),
            record(json!({"status": "active"})),
        )
        .await
        .unwrap();
        let again = Model::<Route>::first_or_create(
            &db,
            record(json!({"name": "A"})),
            record(json!({"status": "other"})),
        )
        .await
        .unwrap();
        assert_eq!(first.id(), again.id());
        assert_eq!(again.get("status"), Some(json!("active")));

        let updated = Model::<Route>::update_or_create(
            &db,
            record(json!({"name": "A"})),
            record(json!({"status": "idle"})),
        )
        .await
        .unwrap();
        assert_eq!(updated.id(), first.id());
        assert_eq!(updated.get("status"), Some(json!("idle")));
        assert_eq!(adapter.rows("routes").await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_validated_rejects_before_adapter() {
        let (db, adapter) = database();
        let payload = RequestPayload::from_json(json!({"status": "active"}), Rules::new().required("name"));
        let error = Model::<Route>::create_validated(&db, payload).await.unwrap_err();
        assert!(matches!(error, ModelError::Validation(_)));
        assert_eq!(adapter.stats().snapshot().total(), 0);
    }
}
