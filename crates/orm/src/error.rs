//! Error types for the active-record core
//!
//! Read-path misses surface as `NotFound` only from the `*_or_fail` variants,
//! adapter rejections of writes are wrapped into `Persistence` with the entity
//! and operation attached, and everything else maps onto a small set of
//! configuration and execution errors.

use std::fmt;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Write operations that can fail at the adapter boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    BulkInsert,
    SoftDelete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::BulkInsert => write!(f, "bulk insert"),
            Operation::SoftDelete => write!(f, "soft delete"),
        }
    }
}

/// Error types for ORM operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// `find_or_fail` / `first_or_fail` matched zero rows
    #[error("No {entity} record found{}", .key.as_ref().map(|k| format!(" for key {}", k)).unwrap_or_default())]
    NotFound { entity: String, key: Option<String> },

    /// An eager-load name has no declared association
    #[error("Relation '{relation}' is not declared on {entity}")]
    RelationConfiguration { entity: String, relation: String },

    /// The execution adapter rejected a write
    #[error("Failed to {operation} {entity}: {message}")]
    Persistence {
        entity: String,
        operation: Operation,
        message: String,
    },

    /// Caller payload failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Instance operation that needs a persisted row
    #[error("Primary key is missing or invalid")]
    MissingPrimaryKey,

    /// Generic execution error raised by the adapter
    #[error("Database error: {0}")]
    Database(String),

    /// Query could not be built or executed as requested
    #[error("Query error: {0}")]
    Query(String),

    /// Transaction scope error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Entity or runtime configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection pool error
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ModelError {
    pub fn not_found(entity: &str, key: Option<String>) -> Self {
        ModelError::NotFound {
            entity: entity.to_string(),
            key,
        }
    }

    pub fn relation(entity: &str, relation: &str) -> Self {
        ModelError::RelationConfiguration {
            entity: entity.to_string(),
            relation: relation.to_string(),
        }
    }

    /// Wrap an adapter failure into a `Persistence` error.
    ///
    /// Already-typed caller errors (validation, configuration, a previous
    /// persistence failure) pass through untouched.
    pub fn into_persistence(self, entity: &str, operation: Operation) -> Self {
        match self {
            ModelError::Persistence { .. }
            | ModelError::Validation(_)
            | ModelError::Configuration(_)
            | ModelError::RelationConfiguration { .. } => self,
            other => {
                let message = match other {
                    ModelError::Database(msg)
                    | ModelError::Query(msg)
                    | ModelError::Transaction(msg)
                    | ModelError::Connection(msg)
                    | ModelError::Serialization(msg) => msg,
                    other => other.to_string(),
                };
                ModelError::Persistence {
                    entity: entity.to_string(),
                    operation,
                    message,
                }
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. })
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ModelError::Connection(err.to_string())
            }
            other => ModelError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<ValidationErrors> for ModelError {
    fn from(errors: ValidationErrors) -> Self {
        ModelError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_includes_key() {
        let err = ModelError::not_found("routes", Some("9999".to_string()));
        assert_eq!(err.to_string(), "No routes record found for key 9999");

        let err = ModelError::not_found("routes", None);
        assert_eq!(err.to_string(), "No routes record found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_into_persistence_keeps_adapter_message() {
        let err = ModelError::Database("duplicate key value".to_string())
            .into_persistence("routes", Operation::Create);

        match err {
            ModelError::Persistence {
                entity,
                operation,
                message,
            } => {
                assert_eq!(entity, "routes");
                assert_eq!(operation, Operation::Create);
                assert_eq!(message, "duplicate key value");
            }
            other => panic!("Expected persistence error, got {:?}", other),
        }
    }

    #[test]
    fn test_into_persistence_passes_configuration_through() {
        let err = ModelError::Configuration("no soft delete column".to_string())
            .into_persistence("routes", Operation::SoftDelete);
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_relation_error_message() {
        let err = ModelError::relation("routes", "driver");
        assert_eq!(err.to_string(), "Relation 'driver' is not declared on routes");
    }
}
