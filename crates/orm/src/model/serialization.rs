//! Serializer - JSON and search projections of a model
//!
//! `to_json` is everything the row carries (declared and custom columns,
//! loaded relations) minus `hidden`. `to_searchable_object` is the
//! explicitly enumerated `searchable` list, still minus `hidden`.

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::entity::Entity;
use super::Model;
use crate::attributes::Record;

impl<E: Entity> Model<E> {
    pub fn to_json(&self) -> Value {
        let hidden = E::hidden();
        let mut object = Record::new();

        let attributes = self.attributes();
        for (column, value) in attributes.custom().iter().chain(attributes.current()) {
            if hidden.contains(&column.as_str()) {
                continue;
            }
            let value = E::get_attribute(column, value).unwrap_or_else(|| value.clone());
            object.insert(column.clone(), value);
        }

        for (name, relation) in self.relations() {
            if !hidden.contains(&name.as_str()) {
                object.insert(name.clone(), relation.to_json());
            }
        }

        Value::Object(object)
    }

    /// Projection handed to a search index
    pub fn to_searchable_object(&self) -> Value {
        let hidden = E::hidden();
        let object: Record = E::searchable()
            .iter()
            .filter(|column| !hidden.contains(column))
            .filter_map(|column| self.get(column).map(|value| (column.to_string(), value)))
            .collect();
        Value::Object(object)
    }
}

impl<E: Entity> Serialize for Model<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
