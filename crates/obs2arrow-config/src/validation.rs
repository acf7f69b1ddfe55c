// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Context, Result};
use obs2arrow_core::{FieldMappingTable, ProcessorConfig};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_processor_config(&config.processor)?;
    validate_runtime_settings(&config.runtime)?;

    if let Some(path) = &config.schema_path {
        if path.as_os_str().is_empty() {
            bail!("schema_path must not be empty when set");
        }
    }

    Ok(())
}

fn validate_processor_config(config: &ProcessorConfig) -> Result<()> {
    // Surface mapping errors at load time instead of at processor init
    FieldMappingTable::from_config(config).context("Invalid processor field mapping")?;

    if config.identifiers.is_empty()
        && config.measurements.is_empty()
        && config.categories.is_empty()
        && config.tags.is_empty()
    {
        warn!("processor maps no fields; batches will only carry time and tags");
    }

    Ok(())
}

fn validate_runtime_settings(settings: &RuntimeSettings) -> Result<()> {
    if settings.poll_interval_ms == 0 {
        bail!("runtime.poll_interval_ms must be greater than 0");
    }

    if settings.poll_interval_ms > 60 * 60 * 1000 {
        warn!(
            poll_interval_ms = settings.poll_interval_ms,
            "runtime.poll_interval_ms is over an hour; batches may grow very large"
        );
    }

    if settings.log_level.trim().is_empty() {
        bail!("runtime.log_level must not be empty");
    }

    if let Some(path) = &settings.output.path {
        if path.as_os_str().is_empty() {
            bail!("runtime.output.path must not be empty when set");
        }
    }

    Ok(())
}
