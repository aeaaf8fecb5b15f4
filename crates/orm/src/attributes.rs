//! Attribute store - current and original column values of one row
//!
//! `current` and `original` are identical right after hydration or a
//! persist; setters make them diverge until the next sync. Columns the
//! entity does not declare are kept verbatim in a separate custom map.

use serde_json::{Map, Value};

/// A row: column name to value
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    current: Record,
    original: Record,
    custom: Record,
}

impl AttributeStore {
    /// Empty store for a transient instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a fetched row into declared and custom columns.
    ///
    /// An empty `declared` list treats every column as declared.
    pub fn hydrate(row: Record, declared: &[&str]) -> Self {
        let mut current = Record::new();
        let mut custom = Record::new();

        for (column, value) in row {
            if declared.is_empty() || declared.contains(&column.as_str()) {
                current.insert(column, value);
            } else {
                custom.insert(column, value);
            }
        }

        Self {
            original: current.clone(),
            current,
            custom,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.current.get(column).or_else(|| self.custom.get(column))
    }

    /// Set a declared column, or a custom one when `declared` does not list it
    pub fn set(&mut self, column: &str, value: Value, declared: &[&str]) {
        if declared.is_empty() || declared.contains(&column) {
            self.current.insert(column.to_string(), value);
        } else {
            self.custom.insert(column.to_string(), value);
        }
    }

    pub fn current(&self) -> &Record {
        &self.current
    }

    pub fn original(&self) -> &Record {
        &self.original
    }

    pub fn custom(&self) -> &Record {
        &self.custom
    }

    pub fn original_value(&self, column: &str) -> Option<&Value> {
        self.original.get(column)
    }

    /// Declared columns whose current value differs from the snapshot
    pub fn dirty(&self) -> Record {
        self.current
            .iter()
            .filter(|(column, value)| self.original.get(*column) != Some(*value))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.current
            .iter()
            .any(|(column, value)| self.original.get(column) != Some(value))
    }

    pub fn is_column_dirty(&self, column: &str) -> bool {
        self.current.get(column) != self.original.get(column)
    }

    /// Make the snapshot match the current values
    pub fn sync_original(&mut self) {
        self.original = self.current.clone();
    }

    /// Row snapshot used in event payloads: declared plus custom columns
    pub fn snapshot(&self) -> Record {
        let mut record = self.current.clone();
        for (column, value) in &self.custom {
            record
                .entry(column.clone())
                .or_insert_with(|| value.clone());
        }
        record
    }
}

/// Hashable key for matching values across rows.
///
/// Numbers and their string forms collapse to the same key so a string
/// foreign key still matches an integer primary key.
pub(crate) fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DECLARED: &[&str] = &["id", "name", "status"];

    fn row() -> Record {
        json!({"id": 1, "name": "Alpha", "status": "active", "distance_km": 12})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_hydrate_splits_custom_columns() {
        let store = AttributeStore::hydrate(row(), DECLARED);

        assert_eq!(store.current().len(), 3);
        assert_eq!(store.custom().get("distance_km"), Some(&json!(12)));
        assert_eq!(store.current(), store.original());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_set_marks_dirty_until_synced() {
        let mut store = AttributeStore::hydrate(row(), DECLARED);
        store.set("status", json!("inactive"), DECLARED);

        assert!(store.is_dirty());
        assert!(store.is_column_dirty("status"));
        assert!(!store.is_column_dirty("name"));
        assert_eq!(store.dirty().len(), 1);
        assert_eq!(store.original_value("status"), Some(&json!("active")));

        store.sync_original();
        assert!(!store.is_dirty());
        assert_eq!(store.original_value("status"), Some(&json!("inactive")));
    }

    #[test]
    fn test_undeclared_set_goes_to_custom() {
        let mut store = AttributeStore::new();
        store.set("rank", json!(3), DECLARED);

        assert!(store.current().is_empty());
        assert_eq!(store.get("rank"), Some(&json!(3)));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_snapshot_merges_custom_columns() {
        let store = AttributeStore::hydrate(row(), DECLARED);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.get("distance_km"), Some(&json!(12)));
    }

    #[test]
    fn test_value_key_collapses_numbers_and_strings() {
        assert_eq!(value_key(&json!(7)), value_key(&json!("7")));
        assert_eq!(value_key(&Value::Null), None);
    }
}
