//! Arrow IPC stream encoding for materialized batches.

use arrow::error::ArrowError;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use std::io::Cursor;

/// Serialize a RecordBatch to Arrow IPC stream format bytes.
pub fn serialize_batch(batch: &RecordBatch) -> Result<Vec<u8>, ArrowError> {
    serialize_batches(std::slice::from_ref(batch))
}

/// Serialize batches sharing one schema into a single IPC stream.
pub fn serialize_batches(batches: &[RecordBatch]) -> Result<Vec<u8>, ArrowError> {
    let first = batches.first().ok_or_else(|| {
        ArrowError::InvalidArgumentError("No batches to serialize".to_string())
    })?;

    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, first.schema().as_ref())?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.finish()?;
    }
    Ok(buffer)
}

/// Deserialize the first RecordBatch of an Arrow IPC stream.
pub fn deserialize_batch(bytes: &[u8]) -> Result<RecordBatch, ArrowError> {
    let cursor = Cursor::new(bytes);
    let mut reader = StreamReader::try_new(cursor, None)?;
    reader
        .next()
        .ok_or_else(|| ArrowError::IpcError("No batch in stream".to_string()))?
}

/// Deserialize every RecordBatch of an Arrow IPC stream.
pub fn deserialize_batches(bytes: &[u8]) -> Result<Vec<RecordBatch>, ArrowError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    reader.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::mapping::FieldMappingTable;
    use crate::builder::RecordBuilder;
    use crate::types::RawPayload;
    use std::collections::BTreeMap;

    fn observation_batch(payload: &str) -> RecordBatch {
        let config = ProcessorConfig {
            measurements: BTreeMap::from([("open".to_string(), "open".to_string())]),
            ..Default::default()
        };
        let mapping = FieldMappingTable::from_config(&config).unwrap();
        RecordBuilder::new(&config, &mapping)
            .build(&[RawPayload::new(0, payload.as_bytes().to_vec())])
            .unwrap()
            .into_batch()
            .unwrap()
            .batch
    }

    #[test]
    fn test_observation_batch_survives_ipc() {
        let original = observation_batch(
            r#"[{"time": 1, "open": 1.5, "_tags": ["a", "b"]}, {"time": 2}]"#,
        );
        let bytes = serialize_batch(&original).unwrap();
        let restored = deserialize_batch(&bytes).unwrap();

        assert_eq!(original.schema(), restored.schema());
        assert_eq!(original, restored);
    }

    #[test]
    fn test_multiple_batches_in_one_stream() {
        let first = observation_batch("time,open\n1,1\n");
        let second = observation_batch("time,open\n2,2\n3,3\n");
        let bytes = serialize_batches(&[first, second]).unwrap();

        let batches = deserialize_batches(&bytes).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].num_rows(), 1);
        assert_eq!(batches[1].num_rows(), 2);
    }

    #[test]
    fn test_empty_inputs_fail() {
        assert!(serialize_batches(&[]).is_err());
        assert!(deserialize_batch(&[]).is_err());
    }
}
