//! Entity descriptor - table metadata, mass-assignment policy and hooks
//!
//! One implementation per table drives the whole generic engine: the query
//! builder, the lifecycle manager, the relation loader and the serializer
//! all read their configuration from here.

use async_trait::async_trait;
use serde_json::Value;

use crate::attributes::Record;
use crate::error::ModelResult;
use crate::relationships::Relation;

/// Declarative schema of one table
#[async_trait]
pub trait Entity: Send + Sync + Sized + 'static {
    /// Table name for this entity
    fn table_name() -> &'static str;

    /// Prefix of lifecycle event names (`<entity>:created`)
    fn entity_name() -> &'static str {
        Self::table_name()
    }

    /// Primary key field name
    fn primary_key_name() -> &'static str {
        "id"
    }

    /// Declared columns. Anything else a row carries is kept as a custom
    /// column.
    fn columns() -> &'static [&'static str];

    /// Columns settable through create/update payloads
    fn fillable() -> &'static [&'static str];

    /// Columns never settable through mass assignment, even when fillable
    fn guarded() -> &'static [&'static str] {
        &[]
    }

    /// Columns excluded from JSON and search projections
    fn hidden() -> &'static [&'static str] {
        &[]
    }

    /// Columns exposed to search indexing
    fn searchable() -> &'static [&'static str] {
        &[]
    }

    fn relations() -> &'static [Relation] {
        &[]
    }

    /// Check if this entity stamps `created_at` / `updated_at`
    fn uses_timestamps() -> bool {
        true
    }

    /// Check if inserts get a generated `uuid`
    fn uses_uuid() -> bool {
        Self::columns().contains(&"uuid")
    }

    /// Column stamped by `soft_delete`, if the entity supports it
    fn soft_delete_column() -> Option<&'static str> {
        None
    }

    /// Setter hooks, applied in declaration order to every create/update
    /// payload after mass-assignment filtering.
    async fn set_attributes(_attributes: &mut Record) -> ModelResult<()> {
        Ok(())
    }

    /// Getter hook; `Some` replaces the stored value on read
    fn get_attribute(_column: &str, _value: &Value) -> Option<Value> {
        None
    }

    fn relation(name: &str) -> Option<&'static Relation> {
        Self::relations().iter().find(|relation| relation.name == name)
    }
}
