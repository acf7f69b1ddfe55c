use crate::{LogFormat, OutputFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};
use obs2arrow_core::PayloadFormat;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "OBS2ARROW_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the OBS2ARROW_ prefix
    /// Used for ecosystem variables such as RUST_LOG
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Processor configuration
    if let Some(format) = get_env_string(env, "TIME_FORMAT")? {
        config.processor.time_format = Some(format);
    }
    if let Some(selector) = get_env_string(env, "TIME_SELECTOR")? {
        config.processor.time_selector = selector;
    }
    if let Some(format) = get_env_string(env, "FORMAT")? {
        config.processor.format = format
            .parse::<PayloadFormat>()
            .context("Invalid OBS2ARROW_FORMAT value")?;
    }
    if let Some(tags) = get_env_list(env, "TAGS")? {
        config.processor.tags = tags;
    }
    if let Some(path) = get_env_string(env, "SCHEMA_PATH")? {
        config.schema_path = (!path.is_empty()).then(|| PathBuf::from(path));
    }

    // Runtime configuration
    if let Some(val) = get_env_u64(env, "POLL_INTERVAL_MS")? {
        config.runtime.poll_interval_ms = val;
    }
    // Fall back to RUST_LOG so the usual tracing knob keeps working
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.runtime.log_level = level;
    } else if let Some(level) = get_raw_env_string(env, "RUST_LOG")? {
        config.runtime.log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.runtime.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Output
    if let Some(format) = get_env_string(env, "OUTPUT_FORMAT")? {
        config.runtime.output.format = format
            .parse::<OutputFormat>()
            .context("Invalid OBS2ARROW_OUTPUT_FORMAT value")?;
    }
    if let Some(path) = get_env_string(env, "OUTPUT_PATH")? {
        config.runtime.output.path = (!path.is_empty()).then(|| PathBuf::from(path));
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the OBS2ARROW_ prefix
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Comma-separated list; blank entries are dropped.
fn get_env_list<E: EnvSource>(env: &E, key: &str) -> Result<Option<Vec<String>>> {
    Ok(get_env_string(env, key)?.map(|val| {
        val.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<String, String>);

    impl MapEnv {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    #[test]
    fn test_processor_overrides() {
        let env = MapEnv::new(&[
            ("OBS2ARROW_TIME_SELECTOR", "_time"),
            ("OBS2ARROW_FORMAT", "flux-csv"),
            ("OBS2ARROW_TAGS", "host, cpu,,"),
            ("OBS2ARROW_SCHEMA_PATH", "/etc/obs2arrow/schema.json"),
        ]);
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.processor.time_selector, "_time");
        assert_eq!(config.processor.format, PayloadFormat::AnnotatedCsv);
        assert_eq!(config.processor.tags, vec!["host", "cpu"]);
        assert_eq!(
            config.schema_path,
            Some(PathBuf::from("/etc/obs2arrow/schema.json"))
        );
    }

    #[test]
    fn test_runtime_overrides() {
        let env = MapEnv::new(&[
            ("OBS2ARROW_POLL_INTERVAL_MS", "50"),
            ("OBS2ARROW_LOG_FORMAT", "JSON"),
            ("OBS2ARROW_OUTPUT_FORMAT", "parquet"),
            ("OBS2ARROW_OUTPUT_PATH", "/tmp/out"),
            ("RUST_LOG", "debug"),
        ]);
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.runtime.poll_interval_ms, 50);
        assert_eq!(config.runtime.log_format, LogFormat::Json);
        assert_eq!(config.runtime.log_level, "debug");
        assert_eq!(config.runtime.output.format, OutputFormat::Parquet);
        assert_eq!(config.runtime.output.path, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_prefixed_log_level_wins_over_rust_log() {
        let env = MapEnv::new(&[("OBS2ARROW_LOG_LEVEL", "warn"), ("RUST_LOG", "trace")]);
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.runtime.log_level, "warn");
    }

    #[test]
    fn test_invalid_values_fail() {
        let mut config = RuntimeConfig::default();
        let env = MapEnv::new(&[("OBS2ARROW_POLL_INTERVAL_MS", "soon")]);
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("OBS2ARROW_POLL_INTERVAL_MS"));

        let env = MapEnv::new(&[("OBS2ARROW_FORMAT", "xml")]);
        assert!(apply_env_overrides(&mut config, &env).is_err());
    }
}
