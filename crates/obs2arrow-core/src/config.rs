// Processor configuration
//
// Built once by the caller, frozen at `Processor::init`. Field maps are keyed by
// output name and point at the source selector in the payload.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default selector for the time column.
pub const DEFAULT_TIME_SELECTOR: &str = "time";

/// Which extractor handles accepted payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadFormat {
    /// Sniff each payload's leading byte.
    #[default]
    Auto,
    Csv,
    Json,
    /// InfluxDB annotated CSV, as produced by Flux queries.
    #[serde(alias = "flux-csv")]
    AnnotatedCsv,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Auto => "auto",
            PayloadFormat::Csv => "csv",
            PayloadFormat::Json => "json",
            PayloadFormat::AnnotatedCsv => "annotated-csv",
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(PayloadFormat::Auto),
            "csv" => Ok(PayloadFormat::Csv),
            "json" => Ok(PayloadFormat::Json),
            "flux-csv" | "fluxcsv" | "annotated-csv" => Ok(PayloadFormat::AnnotatedCsv),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

fn default_time_selector() -> String {
    DEFAULT_TIME_SELECTOR.to_string()
}

/// Declarative field-role mapping for one processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// chrono `strftime` pattern for text time values; empty or absent
    /// selects epoch/RFC 3339 parsing.
    #[serde(default)]
    pub time_format: Option<String>,

    #[serde(default = "default_time_selector")]
    pub time_selector: String,

    /// Output name -> source selector.
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,

    #[serde(default)]
    pub measurements: BTreeMap<String, String>,

    #[serde(default)]
    pub categories: BTreeMap<String, String>,

    /// Source selectors whose values become tag tokens.
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub format: PayloadFormat,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            time_format: None,
            time_selector: default_time_selector(),
            identifiers: BTreeMap::new(),
            measurements: BTreeMap::new(),
            categories: BTreeMap::new(),
            tags: Vec::new(),
            format: PayloadFormat::Auto,
        }
    }
}

impl ProcessorConfig {
    /// Build a config from a connector-style string parameter map.
    ///
    /// Recognised keys: `time_format`, `time_selector`, `format`. Unknown keys
    /// are ignored so a shared parameter map can feed several components.
    pub fn from_params(
        params: &HashMap<String, String>,
        identifiers: BTreeMap<String, String>,
        measurements: BTreeMap<String, String>,
        categories: BTreeMap<String, String>,
        tags: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let format = match params.get("format") {
            Some(raw) => raw.parse()?,
            None => PayloadFormat::Auto,
        };

        let time_selector = params
            .get("time_selector")
            .cloned()
            .unwrap_or_else(default_time_selector);

        Ok(Self {
            time_format: params.get("time_format").cloned(),
            time_selector,
            identifiers,
            measurements,
            categories,
            tags,
            format,
        })
    }

    /// Configured time pattern, `None` when absent or empty.
    pub fn time_format(&self) -> Option<&str> {
        self.time_format.as_deref().filter(|f| !f.is_empty())
    }
}
