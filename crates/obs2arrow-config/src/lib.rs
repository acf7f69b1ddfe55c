// obs2arrow-config - Layered configuration for the obs2arrow runtime
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from OBS2ARROW_CONFIG env var
// 3. Config file contents from OBS2ARROW_CONFIG_CONTENT env var
// 4. Default config file locations (./obs2arrow.toml, ./.obs2arrow.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use obs2arrow_core::{PayloadSchema, ProcessorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use sources::{load_config, load_from_file_path, StdEnvSource};

/// Main runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// JSON Schema document every payload must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,

    #[serde(default)]
    pub runtime: RuntimeSettings,
}

/// Settings for the file-fed pipeline binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RuntimeSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            output: OutputConfig::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Where and how materialized batches are written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Output directory; batches are only summarized on stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Arrow IPC stream
    #[default]
    Ipc,
    Parquet,
    /// Row-oriented observations as JSON lines
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Ipc => "arrows",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Json => "jsonl",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Ipc => write!(f, "ipc"),
            OutputFormat::Parquet => write!(f, "parquet"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ipc" | "arrow" => Ok(OutputFormat::Ipc),
            "parquet" => Ok(OutputFormat::Parquet),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            _ => anyhow::bail!("Unsupported output format: {}. Supported: ipc, parquet, json", s),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config(&StdEnvSource)
    }

    /// Load configuration from a specific file path (for the CLI `--config` flag),
    /// then apply environment overrides.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path, &StdEnvSource)
    }

    /// Build a configuration from optional inline TOML plus overrides supplied
    /// by an `EnvSource`.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed config file over this config.
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.processor = other.processor;
        self.runtime = other.runtime;

        if other.schema_path.is_some() {
            self.schema_path = other.schema_path;
        }
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Compile the configured payload schema, if any.
    pub fn load_payload_schema(&self) -> Result<Option<Arc<PayloadSchema>>> {
        let Some(path) = &self.schema_path else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload schema: {}", path.display()))?;
        let schema = PayloadSchema::from_json_str(&content)
            .with_context(|| format!("Failed to compile payload schema: {}", path.display()))?;
        Ok(Some(Arc::new(schema)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obs2arrow_core::PayloadFormat;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("ipc".parse::<OutputFormat>().unwrap(), OutputFormat::Ipc);
        assert_eq!("arrow".parse::<OutputFormat>().unwrap(), OutputFormat::Ipc);
        assert_eq!(
            "Parquet".parse::<OutputFormat>().unwrap(),
            OutputFormat::Parquet
        );
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.processor.time_selector, "time");
        assert_eq!(config.runtime.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.runtime.log_level, "info");
        assert_eq!(config.runtime.log_format, LogFormat::Text);
        assert_eq!(config.runtime.output.format, OutputFormat::Ipc);
        assert!(config.runtime.output.path.is_none());
        assert!(config.schema_path.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            schema_path = "ticker.schema.json"

            [processor]
            time_format = "%Y-%m-%d %H:%M:%S%:z"
            format = "flux-csv"
            tags = ["venue"]

            [processor.measurements]
            open = "open"

            [runtime]
            poll_interval_ms = 250
            log_format = "json"

            [runtime.output]
            format = "parquet"
            path = "./batches"
            "#,
        )
        .unwrap();

        assert_eq!(config.processor.format, PayloadFormat::AnnotatedCsv);
        assert_eq!(config.processor.measurements["open"], "open");
        assert_eq!(config.processor.tags, vec!["venue".to_string()]);
        assert_eq!(config.runtime.poll_interval_ms, 250);
        assert_eq!(config.runtime.log_level, "info");
        assert_eq!(config.runtime.log_format, LogFormat::Json);
        assert_eq!(config.runtime.output.format, OutputFormat::Parquet);
        assert_eq!(
            config.runtime.output.path.as_deref(),
            Some(Path::new("./batches"))
        );
        assert_eq!(
            config.schema_path.as_deref(),
            Some(Path::new("ticker.schema.json"))
        );
    }

    #[test]
    fn test_unknown_processor_key_rejected() {
        let result = toml::from_str::<RuntimeConfig>("[processor]\nmeasurement = {}\n");
        assert!(result.is_err());
    }
}
