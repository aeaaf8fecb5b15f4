//! ORM and connection pool configuration
//!
//! Both structs have sensible defaults and can be read from the environment.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ModelError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl ConfigError {
    pub fn validation_failed(field: &str, reason: &str) -> Self {
        ConfigError::ValidationFailed {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(
    key: &str,
    field: &str,
    default: T,
    expected: &str,
) -> Result<T, ConfigError>
where
    T: ToString,
{
    let raw = get_env_or_default(key, &default.to_string());
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw,
        expected: expected.to_string(),
    })
}

/// Query builder and adapter behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrmConfig {
    /// Page size used by `paginate` when the caller gives none
    pub default_page_size: u64,
    /// Upper bound for any page size
    pub max_page_size: u64,
    /// Rows per fetch for `each_chunk`
    pub chunk_size: u64,
    /// Emit a `debug!` line per adapter statement
    pub log_statements: bool,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 1000,
            chunk_size: 100,
            log_statements: false,
        }
    }
}

impl OrmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            default_page_size: parse_env(
                "ORM_DEFAULT_PAGE_SIZE",
                "default_page_size",
                defaults.default_page_size,
                "a positive number of rows",
            )?,
            max_page_size: parse_env(
                "ORM_MAX_PAGE_SIZE",
                "max_page_size",
                defaults.max_page_size,
                "a positive number of rows",
            )?,
            chunk_size: parse_env(
                "ORM_CHUNK_SIZE",
                "chunk_size",
                defaults.chunk_size,
                "a positive number of rows",
            )?,
            log_statements: parse_env(
                "ORM_LOG_STATEMENTS",
                "log_statements",
                defaults.log_statements,
                "true or false",
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::validation_failed(
                "default_page_size",
                "must be greater than 0",
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::validation_failed(
                "max_page_size",
                "must be greater than 0",
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::validation_failed(
                "default_page_size",
                "must not exceed max_page_size",
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::validation_failed(
                "chunk_size",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar {
            var: "DATABASE_URL".to_string(),
        })?;

        let defaults = Self::default();
        let config = Self {
            max_connections: parse_env(
                "DB_MAX_CONNECTIONS",
                "max_connections",
                defaults.max_connections,
                "a positive number of connections",
            )?,
            min_connections: parse_env(
                "DB_MIN_CONNECTIONS",
                "min_connections",
                defaults.min_connections,
                "a number of connections",
            )?,
            ..Self::new(&database_url)
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout_seconds: u64) -> Self {
        self.acquire_timeout = timeout_seconds;
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.database_url).map_err(|e| ConfigError::InvalidValue {
            field: "database_url".to_string(),
            value: self.database_url.clone(),
            expected: format!("a valid connection URL ({})", e),
        })?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(ConfigError::InvalidValue {
                field: "database_url".to_string(),
                value: parsed.scheme().to_string(),
                expected: "a postgres:// or postgresql:// URL".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::validation_failed(
                "max_connections",
                "must be greater than 0",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::validation_failed(
                "min_connections",
                "must not exceed max_connections",
            ));
        }
        Ok(())
    }
}
