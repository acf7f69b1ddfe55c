// Payload schema validation
//
// A JSON Schema document is compiled once and shared behind an `Arc`; every
// JSON payload is checked against it before the processor accepts it.

use jsonschema::Validator;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{ConfigError, ValidationError};

/// Compiled JSON Schema for incoming payloads.
pub struct PayloadSchema {
    source: JsonValue,
    validator: Validator,
}

impl fmt::Debug for PayloadSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadSchema")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl PayloadSchema {
    pub fn from_value(schema: JsonValue) -> Result<Self, ConfigError> {
        let validator =
            Validator::new(&schema).map_err(|e| ConfigError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            source: schema,
            validator,
        })
    }

    pub fn from_json_str(schema: &str) -> Result<Self, ConfigError> {
        let value: JsonValue = serde_json::from_str(schema)
            .map_err(|e| ConfigError::InvalidSchema(format!("schema is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// The schema document this validator was compiled from.
    pub fn source(&self) -> &JsonValue {
        &self.source
    }

    /// Validate a raw payload. Payloads that are not JSON are rejected.
    pub fn validate(&self, payload: &[u8]) -> Result<(), ValidationError> {
        let document: JsonValue = serde_json::from_slice(payload).map_err(|e| {
            ValidationError::new(format!("payload is not valid JSON: {e}"), Vec::new())
        })?;
        self.validate_value(&document)
    }

    pub fn validate_value(&self, document: &JsonValue) -> Result<(), ValidationError> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(document)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();

        if violations.is_empty() {
            return Ok(());
        }

        Err(ValidationError::new(violations.join("; "), violations))
    }
}
