//! Security utilities for SQL rendering
//!
//! Identifiers are always quoted; values never reach SQL text and are bound
//! as parameters instead. Raw selection expressions are the one place caller
//! text is interpolated, so they go through `validate_query_pattern` first.

use crate::error::ModelError;

/// Characters allowed in SQL identifiers (alphanumeric, underscore, dollar)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// Escape a SQL identifier (table name, column name, etc.)
///
/// Doubles embedded double quotes and wraps the result in double quotes.
///
/// # Examples
/// ```
/// use elif_record::security::escape_identifier;
///
/// assert_eq!(escape_identifier("routes"), "\"routes\"");
/// assert_eq!(escape_identifier("table\"name"), "\"table\"\"name\"");
/// ```
pub fn escape_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Escape a possibly qualified identifier such as `zones.id`
pub fn escape_qualified(identifier: &str) -> String {
    identifier
        .split('.')
        .map(escape_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Validate that an identifier is a plain, unquoted SQL name
pub fn validate_identifier(identifier: &str) -> Result<(), ModelError> {
    let Some(first) = identifier.chars().next() else {
        return Err(ModelError::Query("Identifier cannot be empty".to_string()));
    };

    // PostgreSQL truncates identifiers past 63 bytes
    if identifier.len() > 63 {
        return Err(ModelError::Query(format!(
            "Identifier '{}' is too long (max 63 characters)",
            identifier
        )));
    }

    if let Some(c) = identifier.chars().find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c)) {
        return Err(ModelError::Query(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    if first.is_ascii_digit() {
        return Err(ModelError::Query(format!(
            "Identifier '{}' cannot start with a number",
            identifier
        )));
    }

    Ok(())
}

/// Reject raw SQL fragments that try to smuggle in extra statements
pub fn validate_query_pattern(sql: &str) -> Result<(), ModelError> {
    let sql_upper = sql.to_uppercase();

    if sql.trim_end().trim_end_matches(';').contains(';') {
        return Err(ModelError::Query(
            "Multiple SQL statements not allowed".to_string(),
        ));
    }

    let dangerous_patterns = [
        "--",
        "/*",
        "*/",
        "UNION ALL SELECT",
        "UNION SELECT",
        "INFORMATION_SCHEMA",
        "PG_CATALOG",
        "PG_SLEEP",
    ];

    for pattern in &dangerous_patterns {
        if sql_upper.contains(pattern) {
            return Err(ModelError::Query(format!(
                "Query contains potentially dangerous pattern: {}",
                pattern
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("route_table"), "\"route_table\"");
        assert_eq!(escape_identifier("table\"name"), "\"table\"\"name\"");
        assert_eq!(escape_qualified("zones.id"), "\"zones\".\"id\"");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("route_table").is_ok());
        assert!(validate_identifier("_private").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("table-name").is_err());
        assert!(validate_identifier("table name").is_err());
    }

    #[test]
    fn test_validate_query_pattern() {
        assert!(validate_query_pattern("count(distinct zone_id) as zones").is_ok());
        assert!(validate_query_pattern("id; DROP TABLE routes").is_err());
        assert!(validate_query_pattern("id -- comment").is_err());
        assert!(validate_query_pattern("id UNION SELECT password FROM users").is_err());
    }
}
