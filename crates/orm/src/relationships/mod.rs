//! Relationships Module - relation declarations and batched eager loading

pub mod containers;
pub mod loader;
pub mod metadata;

pub use containers::RelationValue;
pub use loader::RelationLoader;
pub use metadata::{Relation, RelationshipType};
