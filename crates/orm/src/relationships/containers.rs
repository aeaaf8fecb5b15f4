//! Loaded relation values attached to a model

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::attributes::Record;

/// The shape a loaded relation takes on its parent.
///
/// A single match unwraps to `One`; has-many relations always stay `Many`,
/// even when empty.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    None,
    One(Record),
    Many(Vec<Record>),
}

impl RelationValue {
    pub fn to_json(&self) -> Value {
        match self {
            RelationValue::None => Value::Null,
            RelationValue::One(record) => Value::Object(record.clone()),
            RelationValue::Many(records) => {
                Value::Array(records.iter().cloned().map(Value::Object).collect())
            }
        }
    }

    pub fn as_one(&self) -> Option<&Record> {
        match self {
            RelationValue::One(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Record]> {
        match self {
            RelationValue::Many(records) => Some(records),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RelationValue::None)
    }
}

impl Serialize for RelationValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
