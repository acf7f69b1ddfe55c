use anyhow::{Context, Result};
use clap::Parser;
use obs2arrow_config::{OutputFormat, RuntimeConfig};
use std::path::PathBuf;

/// Turn CSV and JSON payload files into typed Arrow observation batches
#[derive(Parser)]
#[command(name = "obs2arrow")]
#[command(version)]
#[command(about = "Turn CSV and JSON payload files into typed Arrow observation batches", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output encoding: ipc, parquet, json (overrides config file)
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<String>,

    /// Output directory for batches; summaries go to stdout when unset
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Milliseconds between drains of the pending buffer
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Payload files, offered in order
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli)?;
    config.validate()?;

    obs2arrow::init_tracing(&config.runtime);

    let summary = obs2arrow::run_with_config(config, cli.inputs).await?;
    if summary.failed_batches > 0 {
        anyhow::bail!(
            "{} batch(es) failed to materialize, see log for details",
            summary.failed_batches
        );
    }
    Ok(())
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) -> Result<()> {
    if let Some(format) = &cli.format {
        config.runtime.output.format = format.parse::<OutputFormat>()?;
    }

    if let Some(output) = &cli.output {
        config.runtime.output.path = Some(output.clone());
    }

    if let Some(level) = &cli.log_level {
        config.runtime.log_level = level.clone();
    }

    if let Some(interval) = cli.poll_interval_ms {
        config.runtime.poll_interval_ms = interval;
    }

    Ok(())
}
