// Delimited text extractor: one header row, then data rows.

use serde_json::Value as JsonValue;

use super::RawRow;
use crate::error::ExtractError;

pub(crate) fn extract_rows(bytes: &[u8], time_selector: &str) -> Result<Vec<RawRow>, ExtractError> {
    // flexible() so a ragged row reports its position instead of a generic csv error
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ExtractError::MissingHeader);
    }
    if !headers.iter().any(|h| h == time_selector) {
        return Err(ExtractError::MissingTimeColumn {
            selector: time_selector.to_string(),
        });
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != headers.len() {
            return Err(ExtractError::RaggedRow {
                row: index,
                expected: headers.len(),
                found: record.len(),
            });
        }

        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.to_string(), JsonValue::String(value.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_string_valued() {
        let rows = extract_rows(
            b"time,open,_tags\n1605312000,16339.56,a b\n1605312060,16340,\n",
            "time",
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["time"], JsonValue::from("1605312000"));
        assert_eq!(rows[0]["open"], JsonValue::from("16339.56"));
        assert_eq!(rows[0]["_tags"], JsonValue::from("a b"));
        assert_eq!(rows[1]["_tags"], JsonValue::from(""));
    }

    #[test]
    fn test_header_only_payload_has_no_rows() {
        let rows = extract_rows(b"time,open\n", "time").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_time_column() {
        let err = extract_rows(b"ts,open\n1,2\n", "time").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MissingTimeColumn { selector } if selector == "time"
        ));
    }

    #[test]
    fn test_ragged_row_fails_payload() {
        let err = extract_rows(b"time,open\n1,2\n3\n", "time").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(matches!(
            extract_rows(b"", "time"),
            Err(ExtractError::MissingHeader)
        ));
    }

    #[test]
    fn test_quoted_fields() {
        let rows = extract_rows(b"time,name\n1,\"Smith, J\"\n", "time").unwrap();
        assert_eq!(rows[0]["name"], JsonValue::from("Smith, J"));
    }
}
