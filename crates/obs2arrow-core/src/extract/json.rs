// JSON extractor: a single object is one row, an array of objects is N rows.

use serde_json::Value as JsonValue;

use super::RawRow;
use crate::error::ExtractError;
use crate::scalar::json_kind;

pub(crate) fn extract_rows(bytes: &[u8], time_selector: &str) -> Result<Vec<RawRow>, ExtractError> {
    let value: JsonValue = serde_json::from_slice(bytes)?;

    let rows = match value {
        JsonValue::Object(map) => vec![map],
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                JsonValue::Object(map) => Ok(map),
                _ => Err(ExtractError::JsonElement { index }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => return Err(ExtractError::JsonShape(json_kind(&other))),
    };

    // Presence is judged per row; only a payload where no row has the time key is dropped
    if !rows.is_empty() && !rows.iter().any(|row| row.contains_key(time_selector)) {
        return Err(ExtractError::MissingTimeColumn {
            selector: time_selector.to_string(),
        });
    }

    Ok(rows)
}
