// obs2arrow runtime
//
// A file-feeding task stands in for a connector and pushes every input through
// the processor's `DataHandler` boundary. A polling task drains the processor
// on a fixed interval and writes each batch through the `BatchSink`. Once the
// inputs are exhausted, one last drain picks up whatever is still pending.

use anyhow::{Context, Result};
use bytes::Bytes;
use obs2arrow_batch::{DataHandler, Processor};
use obs2arrow_config::RuntimeConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

mod init;
pub mod output;

pub use init::init_tracing;
pub use output::{BatchSink, WrittenBatch};

/// Counters reported once a run finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub payloads_read: usize,
    pub payloads_rejected: usize,
    pub batches_written: usize,
    pub failed_batches: usize,
    pub rows_written: usize,
}

#[derive(Debug, Default)]
struct FeedStats {
    read: usize,
    rejected: usize,
}

/// Entry point with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig, inputs: Vec<PathBuf>) -> Result<RunSummary> {
    config.validate()?;

    let mut processor =
        Processor::init(config.processor.clone()).context("Invalid processor configuration")?;
    if let Some(schema) = config.load_payload_schema()? {
        info!("Validating payloads against {:?}", config.schema_path);
        processor = processor.with_schema(schema);
    }
    let processor = Arc::new(processor);

    let mut sink = BatchSink::new(&config.runtime.output)?;
    info!(
        inputs = inputs.len(),
        format = %sink.format(),
        poll_interval_ms = config.runtime.poll_interval_ms,
        "Starting pipeline"
    );

    let mut feeder = tokio::spawn(feed_inputs(Arc::clone(&processor), inputs));

    let mut ticker = tokio::time::interval(config.runtime.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut summary = RunSummary::default();
    let stats = loop {
        tokio::select! {
            _ = ticker.tick() => {
                drain_once(&mut sink, &processor, &mut summary);
            }
            joined = &mut feeder => {
                break joined.context("Input feeder task panicked")??;
            }
        }
    };

    // Final drain after every input has been offered
    drain_once(&mut sink, &processor, &mut summary);

    summary.payloads_read = stats.read;
    summary.payloads_rejected = stats.rejected;
    info!(
        payloads_read = summary.payloads_read,
        payloads_rejected = summary.payloads_rejected,
        batches = summary.batches_written,
        failed_batches = summary.failed_batches,
        rows = summary.rows_written,
        "Pipeline finished"
    );
    Ok(summary)
}

fn drain_once(sink: &mut BatchSink, processor: &Processor, summary: &mut RunSummary) {
    match sink.flush(processor) {
        Ok(Some(written)) => {
            summary.batches_written += 1;
            summary.rows_written += written.rows;
        }
        Ok(None) => {}
        Err(e) => {
            // The pending payloads were drained with the failed build
            let message = format!("{e:#}");
            error!(error = %message, "Failed to materialize pending payloads");
            summary.failed_batches += 1;
        }
    }
}

async fn feed_inputs<H: DataHandler>(handler: H, inputs: Vec<PathBuf>) -> Result<FeedStats> {
    let mut stats = FeedStats::default();

    for path in inputs {
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read input: {}", path.display()))?;
        stats.read += 1;

        let metadata = HashMap::from([("source".to_string(), path.display().to_string())]);
        if let Err(e) = handler.handle(Bytes::from(data), &metadata) {
            warn!(source = %path.display(), error = %e, "Payload rejected");
            stats.rejected += 1;
        }

        // Give the poller a chance between inputs
        tokio::task::yield_now().await;
    }

    Ok(stats)
}
