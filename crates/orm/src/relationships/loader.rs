//! Relation Loader - batched eager loading
//!
//! One secondary query per requested relation, keyed on the values
//! collected from every parent at once, then partitioned back onto each
//! parent. The same path serves a single model and a whole result set, so
//! both come back with identical shapes.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::containers::RelationValue;
use super::metadata::{Relation, RelationshipType};
use crate::attributes::{value_key, Record};
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, Model};
use crate::query::{Predicate, QueryState};

/// Eager loader for the relations declared on `E`
pub struct RelationLoader;

impl RelationLoader {
    /// Resolve every name up front so a typo fails before any query runs
    pub fn resolve<E: Entity>(names: &[String]) -> ModelResult<Vec<&'static Relation>> {
        names
            .iter()
            .map(|name| E::relation(name).ok_or_else(|| ModelError::relation(E::entity_name(), name)))
            .collect()
    }

    /// Load `names` onto every model in `models`
    pub async fn load<E: Entity>(
        db: &Database,
        models: &mut [Model<E>],
        names: &[String],
    ) -> ModelResult<()> {
        let relations = Self::resolve::<E>(names)?;
        if models.is_empty() {
            return Ok(());
        }

        for relation in relations {
            Self::load_relation(db, models, relation).await?;
        }
        Ok(())
    }

    async fn load_relation<E: Entity>(
        db: &Database,
        models: &mut [Model<E>],
        relation: &'static Relation,
    ) -> ModelResult<()> {
        let parent_key = relation.parent_key();
        let related_key = relation.related_key();

        let mut keys: Vec<Value> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for model in models.iter() {
            if let Some(value) = model.attributes().get(parent_key) {
                if let Some(key) = value_key(value) {
                    if seen.insert(key) {
                        keys.push(value.clone());
                    }
                }
            }
        }

        let mut partitions: HashMap<String, Vec<Record>> = HashMap::new();
        if !keys.is_empty() {
            tracing::debug!(
                "Eager loading '{}' for {} {} model(s) with {} key(s)",
                relation.name,
                models.len(),
                E::entity_name(),
                keys.len()
            );

            let mut state = QueryState::new(relation.related_table);
            state.push_predicate(Predicate::is_in(related_key, keys));
            let rows = db.adapter().select(&state).await?;

            for row in rows {
                if let Some(key) = row.get(related_key).and_then(value_key) {
                    partitions.entry(key).or_default().push(row);
                }
            }
        }

        for model in models.iter_mut() {
            let matched = model
                .attributes()
                .get(parent_key)
                .and_then(value_key)
                .and_then(|key| partitions.get(&key).cloned())
                .unwrap_or_default();
            model.set_relation(relation.name, shape(relation.relationship_type, matched));
        }
        Ok(())
    }
}

/// Belongs-to and has-one unwrap a single match; has-many always stays a list
fn shape(relationship_type: RelationshipType, mut matched: Vec<Record>) -> RelationValue {
    match relationship_type {
        RelationshipType::HasMany => RelationValue::Many(matched),
        RelationshipType::BelongsTo | RelationshipType::HasOne => match matched.len() {
            0 => RelationValue::None,
            1 => RelationValue::One(matched.remove(0)),
            _ => RelationValue::Many(matched),
        },
    }
}

/// Relation values keyed by relation name, in name order
pub type LoadedRelations = BTreeMap<String, RelationValue>;
