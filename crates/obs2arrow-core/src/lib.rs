// obs2arrow-core - Mapping-driven observation batch building
//
// This crate contains the PURE conversion logic: raw CSV/JSON payload bytes
// plus a declarative field-role mapping in, typed Arrow columns out.
// No I/O, no async, no locking. Buffering and concurrency live in
// obs2arrow-batch; files, config and logging setup live in the binary.

pub mod builder;
pub mod config;
pub mod digest;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod mapping;
pub mod observation;
pub mod scalar;
pub mod schema;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use builder::{BatchMetadata, BuiltRows, MaterializedBatch, RecordBuilder};
pub use config::{PayloadFormat, ProcessorConfig};
pub use digest::{compute_digest, ContentDigest};
pub use error::{
    ConfigError, ExtractError, ProcessorError, Result, ScalarError, ValidationError,
};
pub use extract::PayloadShape;
pub use mapping::{FieldMapping, FieldMappingTable, FieldRole};
pub use observation::Observation;
pub use schema::observation_schema;
pub use types::RawPayload;
pub use validation::PayloadSchema;

/// Build one columnar batch from `payloads` under `config`.
///
/// Stateless counterpart of `Processor::get_record` for callers that manage
/// their own payload list.
pub fn payloads_to_record_batch(
    config: &ProcessorConfig,
    payloads: &[RawPayload],
) -> Result<MaterializedBatch> {
    let mapping = FieldMappingTable::from_config(config)?;
    RecordBuilder::new(config, &mapping)
        .build(payloads)?
        .into_batch()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_to_record_batch() {
        let config = ProcessorConfig::default();
        let result = payloads_to_record_batch(
            &config,
            &[RawPayload::new(0, &b"time,_tags\n1,a\n"[..])],
        )
        .unwrap();

        assert_eq!(result.batch.num_rows(), 1);
        assert_eq!(result.batch.num_columns(), 2);
        assert_eq!(result.metadata.payload_count, 1);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let config = ProcessorConfig {
            time_selector: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            payloads_to_record_batch(&config, &[]),
            Err(ProcessorError::Config(ConfigError::EmptyTimeSelector))
        ));
    }
}
