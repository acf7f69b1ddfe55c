//! Payload extraction
//!
//! Turns one accepted payload into raw rows keyed by source selector. Each
//! payload shape has its own extractor; dispatch is a plain match on
//! [`PayloadShape`].

use serde_json::{Map, Value as JsonValue};

use crate::config::PayloadFormat;
use crate::error::ExtractError;

pub mod annotated;
pub mod csv;
pub mod json;

/// One extracted row: source selector -> raw value.
///
/// Delimited extractors store every cell as `JsonValue::String`; JSON keeps
/// the decoded value untouched.
pub type RawRow = Map<String, JsonValue>;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadShape {
    Delimited,
    Json,
    AnnotatedCsv,
}

impl PayloadShape {
    /// Pick a shape from the first meaningful byte of `bytes`.
    pub fn sniff(bytes: &[u8]) -> Self {
        match strip_bom(bytes)
            .iter()
            .find(|b| !b.is_ascii_whitespace())
        {
            Some(b'{') | Some(b'[') => PayloadShape::Json,
            Some(b'#') => PayloadShape::AnnotatedCsv,
            _ => PayloadShape::Delimited,
        }
    }

    /// Resolve the shape for `bytes` under the configured format.
    pub fn resolve(format: PayloadFormat, bytes: &[u8]) -> Self {
        match format {
            PayloadFormat::Auto => Self::sniff(bytes),
            PayloadFormat::Csv => PayloadShape::Delimited,
            PayloadFormat::Json => PayloadShape::Json,
            PayloadFormat::AnnotatedCsv => PayloadShape::AnnotatedCsv,
        }
    }

    /// Whether text values of reserved tag-list selectors are whitespace separated.
    pub fn splits_tag_text(&self) -> bool {
        !matches!(self, PayloadShape::Json)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedPayload {
    pub shape: PayloadShape,
    pub rows: Vec<RawRow>,
}

/// Extract raw rows from `bytes`.
///
/// Fails with [`ExtractError::MissingTimeColumn`] when the payload never
/// carries `time_selector`; callers drop such payloads instead of failing.
pub fn extract(
    shape: PayloadShape,
    bytes: &[u8],
    time_selector: &str,
) -> Result<ExtractedPayload, ExtractError> {
    let bytes = strip_bom(bytes);
    let rows = match shape {
        PayloadShape::Delimited => csv::extract_rows(bytes, time_selector)?,
        PayloadShape::Json => json::extract_rows(bytes, time_selector)?,
        PayloadShape::AnnotatedCsv => annotated::extract_rows(bytes, time_selector)?,
    };

    Ok(ExtractedPayload { shape, rows })
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}
