// Arrow schema for observation batches
//
// Unlike a fixed signal schema, the observation schema is realized per batch:
// `time`, then every mapped field present in at least one row, then `tags`.

use arrow::datatypes::{DataType, Field, Schema};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::mapping::{FieldMapping, FieldRole};

/// Column names and prefixes of the observation schema.
pub mod field {
    pub const TIME: &str = "time";
    pub const TAGS: &str = "tags";
    pub const IDENTIFIER_PREFIX: &str = "id.";
    pub const MEASUREMENT_PREFIX: &str = "measure.";
    pub const CATEGORY_PREFIX: &str = "cat.";
}

pub const SCHEMA_VERSION_KEY: &str = "obs2arrow.schema_version";
pub const SCHEMA_VERSION: &str = "1";

/// Arrow type of a mapped value column.
pub fn value_data_type(role: FieldRole) -> DataType {
    match role {
        FieldRole::Time => DataType::Int64,
        FieldRole::Measurement => DataType::Float64,
        FieldRole::Identifier | FieldRole::Category => DataType::Utf8,
        FieldRole::Tag => tags_data_type(),
    }
}

/// `List<Utf8>` with nullable items, the shape `ListBuilder<StringBuilder>` produces.
pub fn tags_data_type() -> DataType {
    DataType::new_list(DataType::Utf8, true)
}

fn time_field() -> &'static Arc<Field> {
    static FIELD: OnceLock<Arc<Field>> = OnceLock::new();
    FIELD.get_or_init(|| Arc::new(Field::new(field::TIME, DataType::Int64, false)))
}

fn tags_field() -> &'static Arc<Field> {
    static FIELD: OnceLock<Arc<Field>> = OnceLock::new();
    FIELD.get_or_init(|| Arc::new(Field::new(field::TAGS, tags_data_type(), false)))
}

/// Build the schema for a batch whose realized value columns are `present`.
///
/// `present` must already be in column order (see `FieldMappingTable::value_fields`).
pub fn observation_schema<'a, I>(present: I) -> Schema
where
    I: IntoIterator<Item = &'a FieldMapping>,
{
    let mut fields = vec![Arc::clone(time_field())];
    fields.extend(present.into_iter().map(|mapping| {
        Arc::new(Field::new(
            mapping.column_name(),
            value_data_type(mapping.role),
            true,
        ))
    }));
    fields.push(Arc::clone(tags_field()));

    let metadata = HashMap::from([(
        SCHEMA_VERSION_KEY.to_string(),
        SCHEMA_VERSION.to_string(),
    )]);

    Schema::new_with_metadata(fields, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::mapping::FieldMappingTable;
    use std::collections::BTreeMap;

    #[test]
    fn test_schema_layout() {
        let config = ProcessorConfig {
            identifiers: BTreeMap::from([("symbol".to_string(), "sym".to_string())]),
            measurements: BTreeMap::from([("open".to_string(), "open".to_string())]),
            categories: BTreeMap::from([("side".to_string(), "side".to_string())]),
            ..Default::default()
        };
        let table = FieldMappingTable::from_config(&config).unwrap();
        let schema = observation_schema(table.value_fields());

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["time", "id.symbol", "measure.open", "cat.side", "tags"]
        );

        let time = schema.field_with_name("time").unwrap();
        assert_eq!(time.data_type(), &DataType::Int64);
        assert!(!time.is_nullable());

        let open = schema.field_with_name("measure.open").unwrap();
        assert_eq!(open.data_type(), &DataType::Float64);
        assert!(open.is_nullable());

        let tags = schema.field_with_name("tags").unwrap();
        assert_eq!(tags.data_type(), &tags_data_type());

        assert_eq!(
            schema.metadata().get(SCHEMA_VERSION_KEY).map(String::as_str),
            Some(SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_schema_without_value_columns() {
        let schema = observation_schema(std::iter::empty());
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.field(0).name(), "time");
        assert_eq!(schema.field(1).name(), "tags");
    }
}
