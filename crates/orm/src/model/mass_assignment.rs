//! Mass assignment - fillable/guarded filtering of payloads

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::entity::Entity;
use crate::attributes::Record;

/// Keep the columns that are fillable and not guarded.
///
/// Guarded always wins when a column is listed in both.
pub fn fillable<E: Entity>(payload: Record) -> Record {
    let mut accepted = Record::new();
    for (column, value) in payload {
        if is_fillable::<E>(&column) {
            accepted.insert(column, value);
        } else {
            tracing::debug!(
                "Discarding non-fillable attribute '{}' for {}",
                column,
                E::entity_name()
            );
        }
    }
    accepted
}

pub fn is_fillable<E: Entity>(column: &str) -> bool {
    E::fillable().contains(&column) && !E::guarded().contains(&column)
}

/// Current time as RFC 3339 UTC with microsecond precision
pub(crate) fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Assign a uuid and timestamps to a row about to be inserted.
///
/// Values the row already carries are kept.
pub(crate) fn prepare_insert<E: Entity>(attributes: &mut Record) {
    if E::uses_uuid() && attributes.get("uuid").map_or(true, Value::is_null) {
        attributes.insert("uuid".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    if E::uses_timestamps() {
        let now = timestamp();
        attributes
            .entry("created_at".to_string())
            .or_insert_with(|| now.clone());
        attributes.entry("updated_at".to_string()).or_insert(now);
    }
}

/// Strip what an update may never write and stamp `updated_at`
pub(crate) fn prepare_update<E: Entity>(values: &mut Record) {
    values.remove(E::primary_key_name());
    if E::uses_timestamps() {
        values.remove("created_at");
        values.insert("updated_at".to_string(), timestamp());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{Route, Zone};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_guarded_wins_over_fillable() {
        let filtered = fillable::<Route>(record(json!({"name": "Alpha", "secret": "s3cret", "bogus": 1})));
        assert_eq!(filtered, record(json!({"name": "Alpha"})));
    }

    #[test]
    fn test_prepare_insert_assigns_uuid_and_timestamps() {
        let mut row = record(json!({"name": "Alpha"}));
        prepare_insert::<Route>(&mut row);
        assert!(Uuid::parse_str(row["uuid"].as_str().unwrap()).is_ok());
        assert_eq!(row["created_at"], row["updated_at"]);

        let mut keep = record(json!({"uuid": "fixed"}));
        prepare_insert::<Route>(&mut keep);
        assert_eq!(keep["uuid"], json!("fixed"));

        let mut zone = record(json!({"name": "North"}));
        prepare_insert::<Zone>(&mut zone);
        assert_eq!(zone, record(json!({"name": "North"})));
    }

    #[test]
    fn test_prepare_update_never_writes_key_or_created_at() {
        let mut values = record(json!({"id": 4, "created_at": "x", "status": "idle"}));
        prepare_update::<Route>(&mut values);
        assert!(!values.contains_key("id"));
        assert!(!values.contains_key("created_at"));
        assert!(values.contains_key("updated_at"));
    }
}
