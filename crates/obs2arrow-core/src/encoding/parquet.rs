// Parquet encoding for materialized batches
//
// Writer properties follow the column roles of an observation batch:
// - `time`: delta encoded, epoch seconds grow slowly between rows
// - `measure.*`: byte-stream-split floats, dictionaries rarely pay off
// - `id.*`, `cat.*`, `tags`: dictionary encoded, low cardinality text
// Every column is ZSTD compressed and carries page statistics.

use anyhow::Result;
use arrow::array::RecordBatch;
use arrow::datatypes::{DataType, Schema};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, Encoding, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::schema::types::ColumnPath;
use std::io::Write;

use crate::schema::field;

const MAX_ROW_GROUP_SIZE: usize = 64 * 1024;

fn compression_setting() -> Compression {
    ZstdLevel::try_new(3)
        .map(Compression::ZSTD)
        .unwrap_or(Compression::SNAPPY)
}

/// Leaf path of a column as the Arrow writer lays it out.
fn leaf_path(name: &str, data_type: &DataType) -> ColumnPath {
    match data_type {
        DataType::List(item) => ColumnPath::new(vec![
            name.to_string(),
            "list".to_string(),
            item.name().to_string(),
        ]),
        _ => ColumnPath::from(name),
    }
}

/// Writer properties tuned to the columns present in `schema`.
pub fn writer_properties(schema: &Schema) -> WriterProperties {
    let mut builder = WriterProperties::builder()
        .set_dictionary_enabled(false)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting())
        .set_max_row_group_size(MAX_ROW_GROUP_SIZE);

    for column in schema.fields() {
        let name = column.name().as_str();
        let path = leaf_path(name, column.data_type());

        builder = if name == field::TIME {
            builder.set_column_encoding(path, Encoding::DELTA_BINARY_PACKED)
        } else if name.starts_with(field::MEASUREMENT_PREFIX) {
            builder.set_column_encoding(path, Encoding::BYTE_STREAM_SPLIT)
        } else if name == field::TAGS
            || name.starts_with(field::IDENTIFIER_PREFIX)
            || name.starts_with(field::CATEGORY_PREFIX)
        {
            builder.set_column_dictionary_enabled(path, true)
        } else {
            builder
        };
    }

    builder.build()
}

/// Write an observation batch into an arbitrary `Write` sink.
pub fn write_parquet_into<W>(batch: &RecordBatch, writer: &mut W) -> Result<()>
where
    W: Write + Send,
{
    let props = writer_properties(batch.schema_ref());
    let mut arrow_writer = ArrowWriter::try_new(writer, batch.schema(), Some(props))?;

    arrow_writer.write(batch)?;
    arrow_writer.close()?;

    Ok(())
}

/// Write an observation batch to an in-memory Parquet file.
pub fn write_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_parquet_into(batch, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::mapping::FieldMappingTable;
    use crate::types::RawPayload;
    use crate::RecordBuilder;
    use bytes::Bytes;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use std::collections::BTreeMap;

    fn ticker_batch() -> RecordBatch {
        let config = ProcessorConfig {
            identifiers: BTreeMap::from([("symbol".to_string(), "product_id".to_string())]),
            measurements: BTreeMap::from([("price".to_string(), "price".to_string())]),
            categories: BTreeMap::from([("side".to_string(), "side".to_string())]),
            tags: vec!["venue".to_string()],
            ..Default::default()
        };
        let mapping = FieldMappingTable::from_config(&config).unwrap();
        let payload = r#"[
            {"time": 1605312000, "product_id": "BTC-USD", "price": "16339.56", "side": "buy", "venue": "gdax"},
            {"time": 1605312001, "product_id": "BTC-USD", "price": 16340.1, "side": "sell", "venue": "gdax"},
            {"time": 1605312003, "product_id": "ETH-USD", "price": 461.2, "side": "buy"}
        ]"#;
        RecordBuilder::new(&config, &mapping)
            .build(&[RawPayload::new(0, payload.as_bytes().to_vec())])
            .unwrap()
            .into_batch()
            .unwrap()
            .batch
    }

    #[test]
    fn test_write_parquet_round_trip() {
        let batch = ticker_batch();
        let parquet_bytes = write_parquet(&batch).unwrap();
        // Parquet files start and end with "PAR1" magic bytes
        assert_eq!(&parquet_bytes[0..4], b"PAR1");
        assert_eq!(&parquet_bytes[parquet_bytes.len() - 4..], b"PAR1");

        let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(parquet_bytes))
            .unwrap()
            .build()
            .unwrap();
        let restored: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].num_rows(), 3);
        assert_eq!(restored[0].column(0), batch.column(0));
    }

    #[test]
    fn test_column_encodings_follow_roles() {
        let parquet_bytes = write_parquet(&ticker_batch()).unwrap();
        let reader = SerializedFileReader::new(Bytes::from(parquet_bytes)).unwrap();
        let row_group = reader.metadata().row_group(0);

        let encodings = |path: &str| {
            row_group
                .columns()
                .iter()
                .find(|c| c.column_path().string() == path)
                .map(|c| c.encodings().to_vec())
                .unwrap_or_else(|| panic!("no column {path}"))
        };

        assert!(encodings("time").contains(&Encoding::DELTA_BINARY_PACKED));
        assert!(encodings("measure.price").contains(&Encoding::BYTE_STREAM_SPLIT));
        let dictionary = |e: &Vec<Encoding>| {
            e.contains(&Encoding::RLE_DICTIONARY) || e.contains(&Encoding::PLAIN_DICTIONARY)
        };
        assert!(dictionary(&encodings("cat.side")));
        assert!(dictionary(&encodings("id.symbol")));
        assert!(!dictionary(&encodings("measure.price")));
        assert!(!dictionary(&encodings("time")));
    }

    #[test]
    fn test_tags_leaf_path() {
        let schema = ticker_batch().schema();
        let tags = schema.field_with_name(field::TAGS).unwrap();
        assert_eq!(
            leaf_path(tags.name(), tags.data_type()).string(),
            "tags.list.item"
        );
    }
}
