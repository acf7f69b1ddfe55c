// Batch output
//
// Drains a processor and writes what comes out either to numbered files in
// the output directory or, without one, as a one-line summary on stdout.

use anyhow::{Context, Result};
use obs2arrow_batch::Processor;
use obs2arrow_config::{OutputConfig, OutputFormat};
use obs2arrow_core::encoding::{serialize_batch, write_parquet};
use obs2arrow_core::Observation;
use std::path::PathBuf;
use tracing::info;

/// Result of one successful drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBatch {
    pub sequence: u64,
    pub rows: usize,
    pub bytes: usize,
    /// File the batch was written to, `None` when only summarized
    pub path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct BatchSink {
    format: OutputFormat,
    dir: Option<PathBuf>,
    next_sequence: u64,
}

impl BatchSink {
    /// Create the sink, creating the output directory when one is configured.
    pub fn new(config: &OutputConfig) -> Result<Self> {
        if let Some(dir) = &config.path {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create output directory: {}", dir.display())
            })?;
        }

        Ok(Self {
            format: config.format,
            dir: config.path.clone(),
            next_sequence: 1,
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Drain `processor` and write the result.
    ///
    /// Returns `Ok(None)` when the processor had nothing pending.
    pub fn flush(&mut self, processor: &Processor) -> Result<Option<WrittenBatch>> {
        let (rows, encoded) = match self.format {
            OutputFormat::Json => {
                let Some(observations) = processor
                    .get_observations()
                    .context("Failed to materialize observations")?
                else {
                    return Ok(None);
                };
                (observations.len(), encode_json_lines(&observations)?)
            }
            OutputFormat::Ipc | OutputFormat::Parquet => {
                let Some(materialized) = processor
                    .get_record()
                    .context("Failed to materialize batch")?
                else {
                    return Ok(None);
                };

                let metadata = &materialized.metadata;
                info!(
                    payloads = metadata.payload_count,
                    rows = metadata.row_count,
                    skipped_rows = metadata.skipped_rows,
                    dropped_payloads = metadata.dropped_payloads,
                    first_time = ?metadata.first_time,
                    last_time = ?metadata.last_time,
                    "Materialized batch"
                );

                let encoded = if self.format == OutputFormat::Ipc {
                    serialize_batch(&materialized.batch).context("Failed to encode Arrow IPC")?
                } else {
                    write_parquet(&materialized.batch)?
                };
                (materialized.batch.num_rows(), encoded)
            }
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let path = self.write(sequence, rows, &encoded)?;
        Ok(Some(WrittenBatch {
            sequence,
            rows,
            bytes: encoded.len(),
            path,
        }))
    }

    fn write(&self, sequence: u64, rows: usize, encoded: &[u8]) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.dir else {
            println!(
                "batch {sequence:05}: {rows} rows, {} bytes ({})",
                encoded.len(),
                self.format
            );
            return Ok(None);
        };

        let path = dir.join(format!("batch-{sequence:05}.{}", self.format.extension()));
        std::fs::write(&path, encoded)
            .with_context(|| format!("Failed to write batch to {}", path.display()))?;
        info!(path = %path.display(), rows, bytes = encoded.len(), "Wrote batch");
        Ok(Some(path))
    }
}

fn encode_json_lines(observations: &[Observation]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for observation in observations {
        serde_json::to_writer(&mut out, observation).context("Failed to encode observation")?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use obs2arrow_core::ProcessorConfig;
    use std::collections::BTreeMap;

    fn processor() -> Processor {
        Processor::init(ProcessorConfig {
            measurements: BTreeMap::from([("close".to_string(), "close".to_string())]),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_flush_empty_processor_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = BatchSink::new(&OutputConfig {
            format: OutputFormat::Ipc,
            path: Some(dir.path().to_path_buf()),
        })
        .unwrap();

        assert!(sink.flush(&processor()).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_flush_numbers_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = BatchSink::new(&OutputConfig {
            format: OutputFormat::Parquet,
            path: Some(dir.path().join("nested")),
        })
        .unwrap();
        let processor = processor();

        processor
            .on_data(Bytes::from_static(b"time,close\n1,2.5\n"))
            .unwrap();
        let first = sink.flush(&processor).unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.rows, 1);
        assert_eq!(
            first.path.as_deref(),
            Some(dir.path().join("nested/batch-00001.parquet").as_path())
        );

        processor
            .on_data(Bytes::from_static(b"time,close\n2,3.5\n"))
            .unwrap();
        let second = sink.flush(&processor).unwrap().unwrap();
        assert_eq!(second.sequence, 2);
        assert!(dir.path().join("nested/batch-00002.parquet").exists());
    }

    #[test]
    fn test_json_lines_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = BatchSink::new(&OutputConfig {
            format: OutputFormat::Json,
            path: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        let processor = processor();
        processor
            .on_data(Bytes::from_static(b"time,close\n1,2.5\n2,3\n"))
            .unwrap();

        let written = sink.flush(&processor).unwrap().unwrap();
        let content = std::fs::read_to_string(written.path.unwrap()).unwrap();
        let lines: Vec<Observation> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].time, 1);
        assert_eq!(lines[1].measurements["close"], 3.0);
    }

    #[test]
    fn test_stdout_summary_without_path() {
        let mut sink = BatchSink::new(&OutputConfig::default()).unwrap();
        let processor = processor();
        processor
            .on_data(Bytes::from_static(b"time,close\n1,2.5\n"))
            .unwrap();

        let written = sink.flush(&processor).unwrap().unwrap();
        assert!(written.path.is_none());
        assert!(written.bytes > 0);
    }
}
