// obs2arrow-batch - Payload accumulation and materialization
//
// Connectors push payloads in through `on_data`; consumers pull columnar
// batches out through `get_record`. Everything in between is guarded by a
// single mutex per processor, held for exactly one public call.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use obs2arrow_core::{
    ConfigError, FieldMappingTable, MaterializedBatch, Observation, PayloadSchema,
    ProcessorConfig, RecordBuilder, Result,
};
use parking_lot::Mutex;
use tracing::debug;

mod buffer;

pub use buffer::{BufferState, PendingBuffer};

/// Connector callback boundary: a payload plus free-form metadata in, the
/// payload handed back on success.
pub trait DataHandler: Send + Sync {
    fn handle(&self, payload: Bytes, metadata: &HashMap<String, String>) -> Result<Bytes>;
}

/// Thread-safe processor shared between connectors and consumers.
pub struct Processor {
    config: ProcessorConfig,
    mapping: FieldMappingTable,
    schema: Option<Arc<PayloadSchema>>,
    inner: Mutex<PendingBuffer>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("config", &self.config)
            .field("schema", &self.schema)
            .field("pending", &self.inner.try_lock().map(|buffer| buffer.len()))
            .finish()
    }
}

impl Processor {
    /// Validate `config` and build a processor with an empty buffer.
    pub fn init(config: ProcessorConfig) -> std::result::Result<Self, ConfigError> {
        let mapping = FieldMappingTable::from_config(&config)?;
        debug!(
            fields = mapping.len(),
            format = %config.format,
            time_selector = %mapping.time_selector(),
            "initialized processor"
        );

        Ok(Self {
            config,
            mapping,
            schema: None,
            inner: Mutex::new(PendingBuffer::new()),
        })
    }

    /// Validate every payload against `schema` before accepting it.
    pub fn with_schema(mut self, schema: Arc<PayloadSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn mapping(&self) -> &FieldMappingTable {
        &self.mapping
    }

    /// Offer a payload. Returns it unchanged.
    ///
    /// Blank payloads and re-deliveries of the previous payload are passed
    /// through without being buffered.
    pub fn on_data(&self, payload: Bytes) -> Result<Bytes> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            debug!(len = payload.len(), "ignoring blank payload");
            return Ok(payload);
        }

        if let Some(schema) = &self.schema {
            schema.validate(&payload)?;
        }

        let mut guard = self.inner.lock();
        match guard.accept(payload.clone()) {
            Some(index) => debug!(payload = index, len = payload.len(), "accepted payload"),
            None => debug!(len = payload.len(), "ignoring re-delivered payload"),
        }

        Ok(payload)
    }

    /// Drain the buffer into one columnar batch.
    ///
    /// Returns `Ok(None)` when nothing was accepted since the last call. The
    /// buffer is emptied whether or not the build succeeds.
    pub fn get_record(&self) -> Result<Option<MaterializedBatch>> {
        let mut guard = self.inner.lock();
        if guard.is_empty() {
            return Ok(None);
        }

        let payloads = guard.drain();
        let batch = RecordBuilder::new(&self.config, &self.mapping)
            .build(&payloads)?
            .into_batch()?;

        debug!(
            payloads = batch.metadata.payload_count,
            rows = batch.metadata.row_count,
            skipped = batch.metadata.skipped_rows,
            dropped = batch.metadata.dropped_payloads,
            "materialized batch"
        );
        Ok(Some(batch))
    }

    /// Drain the buffer into row-oriented observations, see [`Processor::get_record`].
    pub fn get_observations(&self) -> Result<Option<Vec<Observation>>> {
        let mut guard = self.inner.lock();
        if guard.is_empty() {
            return Ok(None);
        }

        let payloads = guard.drain();
        let observations = RecordBuilder::new(&self.config, &self.mapping)
            .build(&payloads)?
            .into_observations();

        debug!(rows = observations.len(), "materialized observations");
        Ok(Some(observations))
    }

    pub fn state(&self) -> BufferState {
        self.inner.lock().state()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl DataHandler for Processor {
    fn handle(&self, payload: Bytes, _metadata: &HashMap<String, String>) -> Result<Bytes> {
        self.on_data(payload)
    }
}

impl<H: DataHandler + ?Sized> DataHandler for Arc<H> {
    fn handle(&self, payload: Bytes, metadata: &HashMap<String, String>) -> Result<Bytes> {
        (**self).handle(payload, metadata)
    }
}
