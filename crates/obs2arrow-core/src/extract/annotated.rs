// InfluxDB annotated CSV extractor
//
// A payload holds one or more tables. Each table is a run of annotation rows
// (`#datatype`, `#group`, `#default`), a header row and data rows. The first
// column of every row is reserved for the annotation name and is empty on
// header and data rows.

use serde_json::{Number, Value as JsonValue};

use super::RawRow;
use crate::error::ExtractError;

const DATATYPE: &str = "#datatype";
const DEFAULT: &str = "#default";

/// Synthesized tag-list selector for string columns.
const TAGS_COLUMN: &str = "_tags";
const FIELD_COLUMN: &str = "_field";
const VALUE_COLUMN: &str = "_value";

/// Columns never turned into tags.
const NON_TAG_COLUMNS: [&str; 7] = [
    "result",
    "_measurement",
    "_field",
    "_start",
    "_stop",
    "_time",
    "_value",
];

#[derive(Debug, Default)]
struct Table {
    index: usize,
    datatypes: Vec<String>,
    defaults: Vec<String>,
    header: Option<Vec<String>>,
    rows: usize,
}

impl Table {
    fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    fn datatype(&self, column: usize) -> &str {
        self.datatypes
            .get(column)
            .map(String::as_str)
            .unwrap_or("string")
    }

    fn default_value(&self, column: usize) -> &str {
        self.defaults.get(column).map(String::as_str).unwrap_or("")
    }

    fn is_tag_column(&self, column: usize, label: &str) -> bool {
        matches!(self.datatype(column), "" | "string") && !NON_TAG_COLUMNS.contains(&label)
    }
}

pub(crate) fn extract_rows(bytes: &[u8], time_selector: &str) -> Result<Vec<RawRow>, ExtractError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    let mut table = Table::new(0);
    let mut saw_time = false;

    for record in reader.records() {
        let record = record?;
        let first = record.get(0).unwrap_or("");

        if first.starts_with('#') {
            // Annotations after data open the next table
            if table.header.is_some() {
                table = Table::new(table.index + 1);
            }
            let values: Vec<String> = record.iter().map(str::to_string).collect();
            match first {
                DATATYPE => table.datatypes = values,
                DEFAULT => table.defaults = values,
                _ => {}
            }
            continue;
        }

        let Some(header) = table.header.as_ref() else {
            let header: Vec<String> = record.iter().map(str::to_string).collect();
            if header.iter().all(|label| label.is_empty()) {
                return Err(ExtractError::AnnotatedHeader { table: table.index });
            }
            saw_time |= header.iter().any(|label| label == time_selector);
            table.header = Some(header);
            continue;
        };

        // Unannotated result streams repeat the header per table
        if record.iter().eq(header.iter().map(String::as_str)) {
            continue;
        }

        if record.len() != header.len() {
            return Err(ExtractError::AnnotatedRow {
                table: table.index,
                row: table.rows,
                expected: header.len(),
                found: record.len(),
            });
        }

        rows.push(build_row(&table, header, &record));
        table.rows += 1;
    }

    if !rows.is_empty() && !saw_time {
        return Err(ExtractError::MissingTimeColumn {
            selector: time_selector.to_string(),
        });
    }

    Ok(rows)
}

fn build_row(table: &Table, header: &[String], record: &::csv::StringRecord) -> RawRow {
    let mut row = RawRow::new();
    let mut tags = Vec::new();

    for (column, (label, cell)) in header.iter().zip(record.iter()).enumerate() {
        if label.is_empty() {
            continue;
        }
        let cell = if cell.is_empty() {
            table.default_value(column)
        } else {
            cell
        };
        if cell.is_empty() {
            continue;
        }

        if table.is_tag_column(column, label) {
            tags.push(JsonValue::String(cell.to_string()));
        }
        row.insert(label.clone(), typed_value(table.datatype(column), cell));
    }

    if let (Some(JsonValue::String(field)), Some(value)) =
        (row.get(FIELD_COLUMN), row.get(VALUE_COLUMN))
    {
        if !row.contains_key(field.as_str()) {
            let (field, value) = (field.clone(), value.clone());
            row.insert(field, value);
        }
    }

    if !row.contains_key(TAGS_COLUMN) {
        row.insert(TAGS_COLUMN.to_string(), JsonValue::Array(tags));
    }

    row
}

/// Decode a cell per its `#datatype`. Unparseable cells stay text so the
/// record builder reports them against the selector that consumes them.
fn typed_value(datatype: &str, cell: &str) -> JsonValue {
    let typed = match datatype {
        "double" => cell
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(JsonValue::Number),
        "long" => cell.parse::<i64>().ok().map(JsonValue::from),
        "unsignedLong" => cell.parse::<u64>().ok().map(JsonValue::from),
        "boolean" => cell.parse::<bool>().ok().map(JsonValue::Bool),
        _ => None,
    };
    typed.unwrap_or_else(|| JsonValue::String(cell.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CPU: &str = "\
#group,false,false,true,true,false,false,true,true,true,true
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string,string,string
#default,_result,,,,,,,,,
,result,table,_start,_stop,_time,_value,_field,_measurement,cpu,host
,,0,2021-08-17T00:00:00Z,2021-08-18T00:00:00Z,2021-08-17T00:16:00Z,99.56272495215877,usage_idle,cpu,cpu-total,DESKTOP-2BSF9I6
,,0,2021-08-17T00:00:00Z,2021-08-18T00:00:00Z,2021-08-17T00:16:10Z,99.1,usage_idle,cpu,cpu-total,DESKTOP-2BSF9I6

#group,false,false,true,true,false,false,true,true,true,true
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string,string,string
#default,_result,,,,,,,,,
,result,table,_start,_stop,_time,_value,_field,_measurement,cpu,host
,,1,2021-08-17T00:00:00Z,2021-08-18T00:00:00Z,2021-08-17T00:16:00Z,0.25,usage_system,cpu,cpu0,DESKTOP-2BSF9I6
";

    #[test]
    fn test_tables_become_rows() {
        let rows = extract_rows(CPU.as_bytes(), "_time").unwrap();
        assert_eq!(rows.len(), 3);

        let first = &rows[0];
        assert_eq!(first["_time"], json!("2021-08-17T00:16:00Z"));
        assert_eq!(first["_value"], json!(99.56272495215877));
        assert_eq!(first["usage_idle"], json!(99.56272495215877));
        assert_eq!(first["table"], json!(0));
        assert_eq!(first["result"], json!("_result"));
        assert_eq!(first["_tags"], json!(["cpu-total", "DESKTOP-2BSF9I6"]));

        let last = &rows[2];
        assert_eq!(last["usage_system"], json!(0.25));
        assert_eq!(last["table"], json!(1));
        assert!(last.get("usage_idle").is_none());
    }

    #[test]
    fn test_missing_time_column() {
        let payload = "#datatype,string,double\n,host,_value\n,a,1\n";
        assert!(matches!(
            extract_rows(payload.as_bytes(), "_time"),
            Err(ExtractError::MissingTimeColumn { .. })
        ));
    }

    #[test]
    fn test_column_count_mismatch() {
        let payload = "#datatype,string,dateTime:RFC3339,double\n,,_time,_value\n,,2021-08-17T00:16:00Z\n";
        assert!(matches!(
            extract_rows(payload.as_bytes(), "_time"),
            Err(ExtractError::AnnotatedRow {
                table: 0,
                row: 0,
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn test_unparseable_typed_cell_stays_text() {
        assert_eq!(typed_value("double", "n/a"), json!("n/a"));
        assert_eq!(typed_value("long", "12"), json!(12));
        assert_eq!(typed_value("boolean", "true"), json!(true));
        assert_eq!(typed_value("duration", "1h"), json!("1h"));
    }
}
