// Record builder
//
// Turns the accepted payloads of one materialization into typed rows, then
// into either an Arrow `RecordBatch` or row-oriented observations.
//
// Failure policy per row:
// - time value missing or unparseable: the row is skipped and counted
// - any other mapped field fails to coerce: the whole build fails
// A payload without the time selector at all is dropped and counted.

use arrow::array::{
    ArrayRef, Float64Builder, Int64Builder, ListBuilder, RecordBatch, StringBuilder,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ProcessorConfig;
use crate::error::{ExtractError, ProcessorError, Result, ScalarError};
use crate::extract::{self, PayloadShape, RawRow};
use crate::mapping::{FieldMapping, FieldMappingTable, FieldRole, TagSource};
use crate::observation::Observation;
use crate::scalar::{coerce_string, measurement_from_json, parse_time};
use crate::schema::observation_schema;
use crate::types::RawPayload;

/// Bookkeeping for one materialization, returned next to the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMetadata {
    /// Payloads drained from the buffer, dropped ones included.
    pub payload_count: usize,
    /// Payloads dropped because they never carried the time selector.
    pub dropped_payloads: usize,
    pub row_count: usize,
    /// Rows skipped for a missing or unparseable time value.
    pub skipped_rows: usize,
    /// Time of the first row kept, in arrival order.
    pub first_time: Option<i64>,
    /// Time of the last row kept, in arrival order.
    pub last_time: Option<i64>,
}

/// A columnar batch plus the metadata gathered while building it.
#[derive(Debug, Clone)]
pub struct MaterializedBatch {
    pub batch: RecordBatch,
    pub metadata: BatchMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
}

/// One typed row. `cells` is indexed like `FieldMappingTable::value_fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRow {
    pub time: i64,
    pub cells: Vec<Cell>,
    pub tags: Vec<String>,
}

/// Typed rows of one materialization, before columnar assembly.
#[derive(Debug, Clone)]
pub struct BuiltRows {
    fields: Vec<FieldMapping>,
    present: Vec<bool>,
    rows: Vec<BuiltRow>,
    metadata: BatchMetadata,
}

/// Builds typed rows from raw payloads under a fixed mapping.
pub struct RecordBuilder<'a> {
    config: &'a ProcessorConfig,
    mapping: &'a FieldMappingTable,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(config: &'a ProcessorConfig, mapping: &'a FieldMappingTable) -> Self {
        Self { config, mapping }
    }

    /// Extract and coerce every payload in arrival order.
    pub fn build(&self, payloads: &[RawPayload]) -> Result<BuiltRows> {
        let fields = self.mapping.value_fields();
        let mut built = BuiltRows {
            fields: fields.to_vec(),
            present: vec![false; fields.len()],
            rows: Vec::new(),
            metadata: BatchMetadata {
                payload_count: payloads.len(),
                ..Default::default()
            },
        };

        for payload in payloads {
            let shape = PayloadShape::resolve(self.config.format, payload.as_bytes());
            let extracted = match extract::extract(
                shape,
                payload.as_bytes(),
                self.mapping.time_selector(),
            ) {
                Ok(extracted) => extracted,
                Err(ExtractError::MissingTimeColumn { selector }) => {
                    warn!(
                        payload = payload.index,
                        selector = %selector,
                        "time selector not found in payload, dropping it"
                    );
                    built.metadata.dropped_payloads += 1;
                    continue;
                }
                Err(source) => {
                    return Err(ProcessorError::Extract {
                        payload: payload.index,
                        source,
                    })
                }
            };

            debug!(
                payload = payload.index,
                shape = ?extracted.shape,
                rows = extracted.rows.len(),
                "extracted payload"
            );

            for (row_index, row) in extracted.rows.iter().enumerate() {
                let time = match self.row_time(row) {
                    Ok(time) => time,
                    Err(e) => {
                        warn!(
                            payload = payload.index,
                            row = row_index,
                            error = %e,
                            "skipping row with invalid time"
                        );
                        built.metadata.skipped_rows += 1;
                        continue;
                    }
                };

                let cells = self
                    .row_cells(row, &mut built.present)
                    .map_err(|(field, source)| ProcessorError::Field {
                        payload: payload.index,
                        row: row_index,
                        selector: field.source_selector.clone(),
                        role: field.role,
                        source,
                    })?;

                let tags = self
                    .row_tags(row, extracted.shape)
                    .map_err(|(selector, source)| ProcessorError::Field {
                        payload: payload.index,
                        row: row_index,
                        selector,
                        role: FieldRole::Tag,
                        source,
                    })?;

                built.metadata.first_time.get_or_insert(time);
                built.metadata.last_time = Some(time);
                built.rows.push(BuiltRow { time, cells, tags });
            }
        }

        built.metadata.row_count = built.rows.len();
        Ok(built)
    }

    fn row_time(&self, row: &RawRow) -> std::result::Result<i64, ScalarError> {
        let raw = row.get(self.mapping.time_selector()).unwrap_or(&JsonValue::Null);
        parse_time(raw, self.config.time_format())
    }

    fn row_cells(
        &self,
        row: &RawRow,
        present: &mut [bool],
    ) -> std::result::Result<Vec<Cell>, (&'a FieldMapping, ScalarError)> {
        let fields: &'a [FieldMapping] = self.mapping.value_fields();
        let mut cells = Vec::with_capacity(fields.len());

        for (index, field) in fields.iter().enumerate() {
            let Some(raw) = row.get(&field.source_selector) else {
                cells.push(Cell::Null);
                continue;
            };
            present[index] = true;

            // A present value must coerce; only absent selectors become nulls
            let cell = match field.role {
                FieldRole::Measurement => measurement_from_json(raw).map(Cell::Number),
                _ => coerce_string(raw).map(Cell::Text),
            }
            .map_err(|e| (field, e))?;
            cells.push(cell);
        }

        Ok(cells)
    }

    fn row_tags(
        &self,
        row: &RawRow,
        shape: PayloadShape,
    ) -> std::result::Result<Vec<String>, (String, ScalarError)> {
        let mut tags: Vec<String> = Vec::new();

        for source in self.mapping.tag_sources() {
            let Some(raw) = row.get(&source.selector) else {
                continue;
            };
            collect_tag_tokens(source, raw, shape, &mut tags)
                .map_err(|e| (source.selector.clone(), e))?;
        }

        Ok(tags)
    }
}

fn push_tag(tags: &mut Vec<String>, token: &str) {
    if !token.is_empty() && !tags.iter().any(|t| t == token) {
        tags.push(token.to_string());
    }
}

fn collect_tag_tokens(
    source: &TagSource,
    raw: &JsonValue,
    shape: PayloadShape,
    tags: &mut Vec<String>,
) -> std::result::Result<(), ScalarError> {
    match raw {
        JsonValue::Null => {}
        JsonValue::String(text) if source.splits_text && shape.splits_tag_text() => {
            for token in text.split_whitespace() {
                push_tag(tags, token);
            }
        }
        JsonValue::Array(items) => {
            for item in items.iter().filter(|item| !item.is_null()) {
                push_tag(tags, &coerce_string(item)?);
            }
        }
        scalar => push_tag(tags, &coerce_string(scalar)?),
    }
    Ok(())
}

impl BuiltRows {
    pub fn metadata(&self) -> &BatchMetadata {
        &self.metadata
    }

    pub fn rows(&self) -> &[BuiltRow] {
        &self.rows
    }

    /// Mappings realized as columns, in column order.
    pub fn present_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields
            .iter()
            .zip(self.present.iter())
            .filter_map(|(field, present)| present.then_some(field))
    }

    /// Assemble the rows into a columnar batch.
    pub fn into_batch(self) -> Result<MaterializedBatch> {
        let mut assembler = ColumnAssembler::with_capacity(
            self.fields
                .iter()
                .zip(self.present.iter())
                .map(|(field, present)| present.then_some(field.role)),
            self.rows.len(),
        );
        for row in &self.rows {
            assembler.append_row(row);
        }

        let schema = Arc::new(observation_schema(self.present_fields()));
        let batch = assembler.finish(schema)?;

        Ok(MaterializedBatch {
            batch,
            metadata: self.metadata,
        })
    }

    /// Convert the rows into row-oriented observations.
    pub fn into_observations(self) -> Vec<Observation> {
        let fields = self.fields;
        self.rows
            .into_iter()
            .map(|row| {
                let mut observation = Observation {
                    time: row.time,
                    tags: row.tags,
                    ..Default::default()
                };
                for (field, cell) in fields.iter().zip(row.cells) {
                    let name = field.output_name.clone();
                    match (field.role, cell) {
                        (_, Cell::Null) => {}
                        (FieldRole::Measurement, Cell::Number(value)) => {
                            observation.measurements.insert(name, value);
                        }
                        (FieldRole::Identifier, Cell::Text(text)) => {
                            observation.identifiers.insert(name, text);
                        }
                        (FieldRole::Category, Cell::Text(text)) => {
                            observation.categories.insert(name, text);
                        }
                        _ => {}
                    }
                }
                observation
            })
            .collect()
    }
}

enum ValueColumn {
    Text(StringBuilder),
    Number(Float64Builder),
}

/// Column builders for the realized schema, mirroring `observation_schema`.
struct ColumnAssembler {
    time: Int64Builder,
    /// One slot per mapped value field; `None` when the field is absent from the batch.
    values: Vec<Option<ValueColumn>>,
    tags: ListBuilder<StringBuilder>,
}

impl ColumnAssembler {
    fn with_capacity<I>(roles: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = Option<FieldRole>>,
    {
        let values = roles
            .into_iter()
            .map(|role| {
                role.map(|role| match role {
                    FieldRole::Measurement => {
                        ValueColumn::Number(Float64Builder::with_capacity(capacity))
                    }
                    _ => ValueColumn::Text(StringBuilder::with_capacity(capacity, capacity * 16)),
                })
            })
            .collect();

        Self {
            time: Int64Builder::with_capacity(capacity),
            values,
            tags: ListBuilder::with_capacity(StringBuilder::new(), capacity),
        }
    }

    fn append_row(&mut self, row: &BuiltRow) {
        self.time.append_value(row.time);

        for (column, cell) in self.values.iter_mut().zip(row.cells.iter()) {
            match (column, cell) {
                (None, _) => {}
                (Some(ValueColumn::Number(builder)), Cell::Number(value)) => {
                    builder.append_value(*value)
                }
                (Some(ValueColumn::Text(builder)), Cell::Text(text)) => builder.append_value(text),
                (Some(ValueColumn::Number(builder)), _) => builder.append_null(),
                (Some(ValueColumn::Text(builder)), _) => builder.append_null(),
            }
        }

        for tag in &row.tags {
            self.tags.values().append_value(tag);
        }
        self.tags.append(true);
    }

    fn finish(mut self, schema: arrow::datatypes::SchemaRef) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
        columns.push(Arc::new(self.time.finish()));
        for column in self.values.iter_mut().flatten() {
            let array: ArrayRef = match column {
                ValueColumn::Text(builder) => Arc::new(builder.finish()),
                ValueColumn::Number(builder) => Arc::new(builder.finish()),
            };
            columns.push(array);
        }
        columns.push(Arc::new(self.tags.finish()));

        Ok(RecordBatch::try_new(schema, columns)?)
    }
}
