//! Model System - one generic model type driven by an `Entity` descriptor
//!
//! - `entity`: the per-table schema descriptor and hook trait
//! - `mass_assignment`: fillable/guarded filtering
//! - `crud_operations`: single-row lifecycle (create, update, save, delete)
//! - `bulk`: transactional multi-row writes
//! - `query_methods`: static query entry points
//! - `serialization`: JSON and search projections

pub mod bulk;
pub mod crud_operations;
pub mod entity;
pub mod mass_assignment;
pub mod query_methods;
pub mod serialization;

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::attributes::{AttributeStore, Record};
use crate::relationships::loader::LoadedRelations;
use crate::relationships::RelationValue;

pub use entity::Entity;

/// One row of `E`'s table.
///
/// Transient until it carries a primary key, persisted afterwards. The
/// model owns its attribute store and never shares it with a query.
pub struct Model<E> {
    attributes: AttributeStore,
    relations: LoadedRelations,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Model<E> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            relations: self.relations.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Model<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("attributes", &self.attributes)
            .field("relations", &self.relations)
            .finish()
    }
}

impl<E> PartialEq for Model<E> {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes && self.relations == other.relations
    }
}

impl<E: Entity> Default for Model<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Model<E> {
    /// Transient instance with no attributes
    pub fn new() -> Self {
        Self {
            attributes: AttributeStore::new(),
            relations: LoadedRelations::new(),
            _entity: PhantomData,
        }
    }

    /// Wrap a fetched row
    pub fn hydrate(row: Record) -> Self {
        Self {
            attributes: AttributeStore::hydrate(row, E::columns()),
            relations: LoadedRelations::new(),
            _entity: PhantomData,
        }
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Attribute value with the entity's getter applied
    pub fn get(&self, column: &str) -> Option<Value> {
        let raw = self.attributes.get(column)?;
        E::get_attribute(column, raw).or_else(|| Some(raw.clone()))
    }

    /// Stored value, bypassing getters
    pub fn get_raw(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    pub fn set<V: Into<Value>>(&mut self, column: &str, value: V) -> &mut Self {
        self.attributes.set(column, value.into(), E::columns());
        self
    }

    /// Mass-assign `payload`, keeping only fillable, unguarded columns
    pub fn fill(&mut self, payload: Record) -> &mut Self {
        for (column, value) in mass_assignment::fillable::<E>(payload) {
            self.attributes.set(&column, value, E::columns());
        }
        self
    }

    /// Primary key value; `None` while transient
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(E::primary_key_name())
            .filter(|value| !value.is_null())
    }

    pub fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes.is_dirty()
    }

    /// Columns changed since the last load or persist
    pub fn dirty(&self) -> Record {
        self.attributes.dirty()
    }

    pub fn original(&self) -> &Record {
        self.attributes.original()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> &LoadedRelations {
        &self.relations
    }

    pub(crate) fn set_relation(&mut self, name: &str, value: RelationValue) {
        self.relations.insert(name.to_string(), value);
    }

    /// Swap in freshly selected attributes, keeping loaded relations
    pub(crate) fn replace_attributes(&mut self, fresh: Self) {
        self.attributes = fresh.attributes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Route;
    use serde_json::json;

    #[test]
    fn test_new_model_is_transient() {
        let model = Model::<Route>::new();
        assert!(!model.is_persisted());
        assert!(model.id().is_none());
        assert!(!model.is_dirty());
    }

    #[test]
    fn test_set_tracks_dirty_columns() {
        let row = json!({"id": 3, "name": "Alpha", "status": "active"});
        let mut model = Model::<Route>::hydrate(row.as_object().cloned().unwrap());
        assert!(model.is_persisted());

        model.set("status", "inactive");
        assert_eq!(model.dirty(), json!({"status": "inactive"}).as_object().cloned().unwrap());
        assert_eq!(model.original()["status"], json!("active"));
    }

    #[test]
    fn test_fill_respects_guarded() {
        let mut model = Model::<Route>::new();
        model.fill(
            json!({"name": "Alpha", "secret": "x", "id": 99})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(model.get("name"), Some(json!("Alpha")));
        assert!(model.get("secret").is_none());
        assert!(model.id().is_none());
    }

    #[test]
    fn test_getter_applies_on_read() {
        let row = json!({"id": 1, "code": "nw-1"});
        let model = Model::<Route>::hydrate(row.as_object().cloned().unwrap());
        assert_eq!(model.get("code"), Some(json!("NW-1")));
        assert_eq!(model.get_raw("code"), Some(&json!("nw-1")));
    }
}
