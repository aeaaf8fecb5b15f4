//! Bulk operations - multi-row writes, each run as one atomic unit
//!
//! An empty input returns straight away without touching the adapter.

use serde_json::Value;

use super::crud_operations::soft_delete_column;
use super::entity::Entity;
use super::mass_assignment::{self, prepare_insert, timestamp};
use super::Model;
use crate::attributes::Record;
use crate::database::Database;
use crate::error::{ModelResult, Operation};
use crate::events::ModelEvent;
use crate::query::{Predicate, QueryBuilder};

impl<E: Entity> Model<E> {
    /// Insert every payload in one batch and return the generated keys.
    ///
    /// Payloads are filtered like `create`, but no per-row event is
    /// dispatched and nothing is re-selected.
    pub async fn create_many(db: &Database, payloads: Vec<Record>) -> ModelResult<Vec<Value>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let mut attributes = mass_assignment::fillable::<E>(payload);
            E::set_attributes(&mut attributes).await?;
            prepare_insert::<E>(&mut attributes);
            rows.push(attributes);
        }

        let count = rows.len();
        let ids = db
            .transaction(|tx| async move {
                tx.adapter()
                    .insert(E::table_name(), E::primary_key_name(), rows)
                    .await
            })
            .await
            .map_err(|e| Self::persistence_error(e, Operation::BulkInsert))?;

        tracing::debug!("Inserted {} {} row(s) in one batch", count, E::entity_name());
        Ok(ids)
    }

    /// Create each payload in turn inside one transaction.
    ///
    /// Any failure rolls back every row already created, and the buffered
    /// `created` events are dropped with them.
    pub async fn bulk_store(db: &Database, payloads: Vec<Record>) -> ModelResult<u64> {
        if payloads.is_empty() {
            return Ok(0);
        }

        db.transaction(|tx| async move {
            let mut stored = 0u64;
            for payload in payloads {
                Self::create(&tx, payload).await?;
                stored += 1;
            }
            Ok(stored)
        })
        .await
    }

    /// Hard-delete the rows with the given keys, one `deleted` event per row
    pub async fn bulk_destroy<V: Into<Value>>(db: &Database, ids: Vec<V>) -> ModelResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();

        db.transaction(|tx| async move {
            let snapshots = QueryBuilder::<E>::new()
                .where_in(E::primary_key_name(), ids.clone())
                .get(&tx)
                .await?;
            if snapshots.is_empty() {
                return Ok(0);
            }

            let deleted = tx
                .adapter()
                .delete(E::table_name(), &[Predicate::is_in(E::primary_key_name(), ids)])
                .await
                .map_err(|e| Self::persistence_error(e, Operation::Delete))?;

            for model in &snapshots {
                tx.dispatch(ModelEvent::deleted(
                    E::entity_name(),
                    model.attributes().snapshot(),
                ))
                .await;
            }
            Ok(deleted)
        })
        .await
    }

    /// Stamp the soft-delete column on every row with the given keys
    pub async fn bulk_soft_delete<V: Into<Value>>(db: &Database, ids: Vec<V>) -> ModelResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let column = soft_delete_column::<E>()?;
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();

        let now = timestamp();
        let mut values = Record::new();
        values.insert(column.to_string(), now.clone());
        if E::uses_timestamps() {
            values.insert("updated_at".to_string(), now);
        }

        db.transaction(|tx| async move {
            tx.adapter()
                .update(
                    E::table_name(),
                    values,
                    &[Predicate::is_in(E::primary_key_name(), ids)],
                )
                .await
                .map_err(|e| Self::persistence_error(e, Operation::SoftDelete))
        })
        .await
    }
}
