// Scalar coercion for raw cell values
//
// Delimited payloads hand us text, JSON payloads hand us `serde_json::Value`s.
// Both funnel through the same three conversions: time, measurement, string.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;

use crate::error::ScalarError;

/// Parse a raw time value into Unix epoch seconds.
///
/// JSON integers and integer text are taken as epoch seconds whatever the
/// format. Other text is parsed with `format` (a chrono `strftime` pattern)
/// when one is configured, and must be RFC 3339 otherwise.
pub fn parse_time(raw: &JsonValue, format: Option<&str>) -> Result<i64, ScalarError> {
    match raw {
        JsonValue::Number(n) => {
            if let Some(secs) = n.as_i64() {
                return Ok(secs);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(f as i64)
                }
                _ => Err(ScalarError::time(n.to_string(), "not an integer epoch")),
            }
        }
        JsonValue::String(text) => parse_time_text(text, format),
        other => Err(ScalarError::time(
            other.to_string(),
            "no time component present",
        )),
    }
}

/// Parse time text, see [`parse_time`].
pub fn parse_time_text(text: &str, format: Option<&str>) -> Result<i64, ScalarError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ScalarError::time(text, "no time component present"));
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        return Ok(secs);
    }

    match format.filter(|f| !f.is_empty()) {
        Some(format) => parse_with_format(trimmed, format).map_err(|e| ScalarError::time(text, e)),
        None => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.timestamp())
            .map_err(|e| ScalarError::time(text, e)),
    }
}

fn parse_with_format(text: &str, format: &str) -> Result<i64, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_str(text, format) {
        return Ok(dt.timestamp());
    }

    // No offset in the pattern: the value is UTC. Date-only patterns land on midnight.
    match NaiveDateTime::parse_from_str(text, format) {
        Ok(naive) => Ok(naive.and_utc().timestamp()),
        Err(err) => NaiveDate::parse_from_str(text, format)
            .map(|date| date.and_time(NaiveTime::MIN).and_utc().timestamp())
            .map_err(|_| err),
    }
}

/// Parse a measurement from text.
///
/// `0x`/`0X`-prefixed values are unsigned 64-bit hexadecimal integers; all
/// other values are decimal floats.
pub fn parse_measurement(text: &str) -> Result<f64, ScalarError> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        // from_str_radix tolerates a leading '+', hex literals do not
        if hex.starts_with('+') {
            return Err(ScalarError::measurement(text, "invalid digit found in string"));
        }
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .map_err(|e| ScalarError::measurement(text, e));
    }

    text.parse::<f64>()
        .map_err(|e| ScalarError::measurement(text, e))
}

/// Coerce a JSON value into a measurement.
///
/// Numbers are taken directly and strings go through [`parse_measurement`].
pub fn measurement_from_json(raw: &JsonValue) -> Result<f64, ScalarError> {
    match raw {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| ScalarError::measurement(n.to_string(), "not representable as f64")),
        JsonValue::String(text) => parse_measurement(text),
        other => Err(ScalarError::InvalidScalar {
            kind: json_kind(other),
        }),
    }
}

/// Render a JSON scalar as its canonical string form.
///
/// Integers print without a decimal point, floats use the shortest decimal
/// form that round-trips.
pub fn coerce_string(raw: &JsonValue) -> Result<String, ScalarError> {
    match raw {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(n.to_string())
            } else {
                n.as_f64()
                    .map(format_float)
                    .ok_or(ScalarError::InvalidScalar { kind: "number" })
            }
        }
        other => Err(ScalarError::InvalidScalar {
            kind: json_kind(other),
        }),
    }
}

/// Shortest round-trip rendering: plain decimal for everyday magnitudes,
/// exponent form once that is the shorter of the two.
fn format_float(value: f64) -> String {
    let plain = value.to_string();
    let exponent = format!("{value:e}");
    if exponent.len() < plain.len() {
        exponent
    } else {
        plain
    }
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
