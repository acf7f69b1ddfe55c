//! Error types for mapping, extraction and record building

use arrow::error::ArrowError;
use thiserror::Error;

use crate::mapping::FieldRole;

/// Errors raised while validating a processor configuration.
///
/// These surface from `Processor::init` and are fatal: the caller must not
/// proceed with a processor whose mapping failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("time selector must not be empty")]
    EmptyTimeSelector,

    #[error("{role} mapping '{output_name}' has an empty source selector")]
    EmptySelector { role: FieldRole, output_name: String },

    #[error("{role} mapping for selector '{selector}' has an empty output name")]
    EmptyOutputName { role: FieldRole, selector: String },

    #[error("source selector '{selector}' is mapped as both {first} and {second}")]
    DuplicateSelector {
        selector: String,
        first: FieldRole,
        second: FieldRole,
    },

    #[error("time selector '{selector}' collides with a {role} mapping")]
    TimeSelectorCollision { selector: String, role: FieldRole },

    #[error("reserved tag selector '{selector}' cannot be mapped as {role}")]
    ReservedSelector { selector: String, role: FieldRole },

    #[error("unknown payload format '{0}' (expected auto, csv, json or flux-csv)")]
    UnknownFormat(String),

    #[error("invalid payload schema: {0}")]
    InvalidSchema(String),
}

/// Errors raised while coercing a single raw value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalarError {
    #[error("invalid time value '{value}': {reason}")]
    TimeParse { value: String, reason: String },

    #[error("invalid measurement '{value}': {reason}")]
    MeasurementParse { value: String, reason: String },

    #[error("expected a string or number, found {kind}")]
    InvalidScalar { kind: &'static str },
}

impl ScalarError {
    pub(crate) fn time(value: impl Into<String>, reason: impl ToString) -> Self {
        Self::TimeParse {
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn measurement(value: impl Into<String>, reason: impl ToString) -> Self {
        Self::MeasurementParse {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while turning one payload into raw rows.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("delimited payload has no header row")]
    MissingHeader,

    #[error("row {row} has {found} fields but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("malformed delimited payload: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON payload must be an object or an array of objects, found {0}")]
    JsonShape(&'static str),

    #[error("JSON array element {index} is not an object")]
    JsonElement { index: usize },

    #[error("annotated CSV table {table} has an empty header row")]
    AnnotatedHeader { table: usize },

    #[error("annotated CSV table {table}, row {row} has {found} fields but the header has {expected}")]
    AnnotatedRow {
        table: usize,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("time selector '{selector}' not found in payload")]
    MissingTimeColumn { selector: String },
}

/// A payload rejected by the configured payload schema before acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload failed schema validation: {message}")]
pub struct ValidationError {
    pub message: String,
    /// Individual violations, in the order the validator reported them.
    pub violations: Vec<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, violations: Vec<String>) -> Self {
        Self {
            message: message.into(),
            violations,
        }
    }
}

/// Errors surfaced by the public processor operations.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("payload {payload}: {source}")]
    Extract {
        payload: u64,
        #[source]
        source: ExtractError,
    },

    #[error("payload {payload}, row {row}: {role} field '{selector}': {source}")]
    Field {
        payload: u64,
        row: usize,
        selector: String,
        role: FieldRole,
        #[source]
        source: ScalarError,
    },

    #[error("failed to assemble column batch: {0}")]
    Arrow(#[from] ArrowError),
}

pub type Result<T, E = ProcessorError> = std::result::Result<T, E>;
