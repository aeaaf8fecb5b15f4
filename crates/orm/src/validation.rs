//! Caller-side payload validation
//!
//! Validation runs before the lifecycle manager sees a payload. Payloads
//! expose `validate()`, `get(key)` and `has(key)`; `RequestPayload` is the
//! stock implementation backed by a record and a small rule set.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::Record;

pub type ValidationResult<T> = Result<T, ValidationErrors>;

/// Individual validation error for a specific field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    /// Error code for programmatic handling
    pub code: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: "validation_failed".to_string(),
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation errors grouped by field
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<ValidationError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors
            .entry(error.field.clone())
            .or_default()
            .push(error);
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(ValidationError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of fields with errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn has_field_errors(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|errors| !errors.is_empty())
    }

    pub fn get_field_errors(&self, field: &str) -> Option<&Vec<ValidationError>> {
        self.errors.get(field)
    }

    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "No validation errors");
        }
        let messages: Vec<String> = self
            .errors
            .values()
            .flatten()
            .map(|error| error.to_string())
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.add(error);
        errors
    }
}

/// The contract a write payload offers to callers before persistence
pub trait Payload {
    fn validate(&self) -> ValidationResult<()>;

    fn get(&self, key: &str) -> Option<&Value>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn into_record(self) -> Record;
}

/// A single field rule
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Present and not null or an empty string
    Required,
    MaxLength(usize),
    OneOf(Vec<Value>),
    Numeric,
}

impl Rule {
    fn check(&self, field: &str, value: Option<&Value>) -> Option<ValidationError> {
        match self {
            Rule::Required => {
                let missing = match value {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.trim().is_empty(),
                    Some(_) => false,
                };
                missing.then(|| {
                    ValidationError::new(field, format!("The {} field is required", field))
                        .code("required")
                })
            }
            Rule::MaxLength(max) => match value {
                Some(Value::String(s)) if s.chars().count() > *max => Some(
                    ValidationError::new(
                        field,
                        format!("The {} field may not be greater than {} characters", field, max),
                    )
                    .code("max_length"),
                ),
                _ => None,
            },
            Rule::OneOf(allowed) => match value {
                Some(v) if !v.is_null() && !allowed.contains(v) => Some(
                    ValidationError::new(field, format!("The selected {} is invalid", field))
                        .code("one_of"),
                ),
                _ => None,
            },
            Rule::Numeric => match value {
                Some(Value::Number(_)) | Some(Value::Null) | None => None,
                Some(Value::String(s)) if s.parse::<f64>().is_ok() => None,
                Some(_) => Some(
                    ValidationError::new(field, format!("The {} field must be a number", field))
                        .code("numeric"),
                ),
            },
        }
    }
}

/// Field rules, applied in declaration order
#[derive(Debug, Clone, Default)]
pub struct Rules {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>, rule: Rule) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, rules)) => rules.push(rule),
            None => self.fields.push((field, vec![rule])),
        }
        self
    }

    pub fn required(self, field: impl Into<String>) -> Self {
        self.field(field, Rule::Required)
    }

    pub fn max_length(self, field: impl Into<String>, max: usize) -> Self {
        self.field(field, Rule::MaxLength(max))
    }

    pub fn one_of<V: Into<Value>>(self, field: impl Into<String>, allowed: Vec<V>) -> Self {
        self.field(field, Rule::OneOf(allowed.into_iter().map(Into::into).collect()))
    }

    pub fn numeric(self, field: impl Into<String>) -> Self {
        self.field(field, Rule::Numeric)
    }

    pub fn check(&self, record: &Record) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        for (field, rules) in &self.fields {
            for rule in rules {
                if let Some(error) = rule.check(field, record.get(field)) {
                    errors.add(error);
                }
            }
        }
        errors.into_result()
    }
}

/// Record-backed payload with declared rules
#[derive(Debug, Clone, Default)]
pub struct RequestPayload {
    data: Record,
    rules: Rules,
}

impl RequestPayload {
    pub fn new(data: Record, rules: Rules) -> Self {
        Self { data, rules }
    }

    /// Build from a JSON object; anything else yields an empty payload
    pub fn from_json(value: Value, rules: Rules) -> Self {
        let data = match value {
            Value::Object(map) => map,
            _ => Record::new(),
        };
        Self::new(data, rules)
    }
}

impl Payload for RequestPayload {
    fn validate(&self) -> ValidationResult<()> {
        self.rules.check(&self.data)
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    fn into_record(self) -> Record {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> Rules {
        Rules::new()
            .required("name")
            .max_length("name", 5)
            .one_of("status", vec!["active", "inactive"])
            .numeric("distance")
    }

    #[test]
    fn test_valid_payload_passes() {
        let payload = RequestPayload::from_json(
            json!({"name": "Alpha", "status": "active", "distance": "12.5"}),
            rules(),
        );
        assert!(payload.validate().is_ok());
        assert!(payload.has("name"));
        assert!(!payload.has("missing"));
        assert_eq!(payload.get("status"), Some(&json!("active")));
    }

    #[test]
    fn test_errors_are_grouped_per_field() {
        let payload = RequestPayload::from_json(
            json!({"name": "   ", "status": "archived", "distance": "far"}),
            rules(),
        );
        let errors = payload.validate().unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors.has_field_errors("name"));
        assert_eq!(errors.get_field_errors("status").unwrap()[0].code, "one_of");
        assert_eq!(errors.get_field_errors("distance").unwrap()[0].code, "numeric");
    }

    #[test]
    fn test_max_length_counts_characters() {
        let payload = RequestPayload::from_json(json!({"name": "Gamma-Ray"}), rules());
        let errors = payload.validate().unwrap_err();
        assert_eq!(errors.get_field_errors("name").unwrap()[0].code, "max_length");
    }

    #[test]
    fn test_non_object_json_is_empty_payload() {
        let payload = RequestPayload::from_json(json!([1, 2]), Rules::new());
        assert!(payload.validate().is_ok());
        assert!(payload.into_record().is_empty());
    }
}
