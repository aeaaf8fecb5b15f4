//! Relationship Metadata - declarative association descriptors

use serde::{Deserialize, Serialize};

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// One-to-one relationship (hasOne)
    HasOne,
    /// One-to-many relationship (hasMany)
    HasMany,
    /// Many-to-one relationship (belongsTo)
    BelongsTo,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

/// A named association declared on an entity.
///
/// For `BelongsTo` the `foreign_key` lives on the declaring table and points
/// at `related_table.local_key`. For `HasOne`/`HasMany` the `foreign_key`
/// lives on `related_table` and points back at the declaring table's
/// `local_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub relationship_type: RelationshipType,
    pub related_table: &'static str,
    pub foreign_key: &'static str,
    pub local_key: &'static str,
}

impl Relation {
    pub const fn belongs_to(name: &'static str, related_table: &'static str, foreign_key: &'static str) -> Self {
        Self {
            name,
            relationship_type: RelationshipType::BelongsTo,
            related_table,
            foreign_key,
            local_key: "id",
        }
    }

    pub const fn has_one(name: &'static str, related_table: &'static str, foreign_key: &'static str) -> Self {
        Self {
            name,
            relationship_type: RelationshipType::HasOne,
            related_table,
            foreign_key,
            local_key: "id",
        }
    }

    pub const fn has_many(name: &'static str, related_table: &'static str, foreign_key: &'static str) -> Self {
        Self {
            name,
            relationship_type: RelationshipType::HasMany,
            related_table,
            foreign_key,
            local_key: "id",
        }
    }

    /// Override the key the foreign key refers to (defaults to `id`)
    pub const fn with_local_key(self, local_key: &'static str) -> Self {
        Self { local_key, ..self }
    }

    /// Column on the parent rows whose values drive the batch query
    pub(crate) fn parent_key(&self) -> &'static str {
        match self.relationship_type {
            RelationshipType::BelongsTo => self.foreign_key,
            RelationshipType::HasOne | RelationshipType::HasMany => self.local_key,
        }
    }

    /// Column on the related rows matched against the parent keys
    pub(crate) fn related_key(&self) -> &'static str {
        match self.relationship_type {
            RelationshipType::BelongsTo => self.local_key,
            RelationshipType::HasOne | RelationshipType::HasMany => self.foreign_key,
        }
    }
}
