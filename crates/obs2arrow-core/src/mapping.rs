// Field mapping table
//
// Resolves a `ProcessorConfig` into an ordered list of typed field mappings.
// Built once at init; extraction and record building only read it.

use std::collections::HashMap;
use std::fmt;

use crate::config::ProcessorConfig;
use crate::error::ConfigError;
use crate::schema::field;

/// Selectors that are always consulted as tag sources.
pub const RESERVED_TAG_SELECTORS: [&str; 2] = ["_tags", "tags"];

/// Semantic role of a source field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldRole {
    Time,
    Identifier,
    Measurement,
    Category,
    Tag,
}

impl FieldRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRole::Time => "time",
            FieldRole::Identifier => "identifier",
            FieldRole::Measurement => "measurement",
            FieldRole::Category => "category",
            FieldRole::Tag => "tag",
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_reserved_tag_selector(selector: &str) -> bool {
    RESERVED_TAG_SELECTORS.contains(&selector)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source_selector: String,
    pub output_name: String,
    pub role: FieldRole,
}

impl FieldMapping {
    fn new(source_selector: &str, output_name: &str, role: FieldRole) -> Self {
        Self {
            source_selector: source_selector.to_string(),
            output_name: output_name.to_string(),
            role,
        }
    }

    /// Column name in the materialized batch.
    pub fn column_name(&self) -> String {
        match self.role {
            FieldRole::Time => field::TIME.to_string(),
            FieldRole::Identifier => format!("{}{}", field::IDENTIFIER_PREFIX, self.output_name),
            FieldRole::Measurement => {
                format!("{}{}", field::MEASUREMENT_PREFIX, self.output_name)
            }
            FieldRole::Category => format!("{}{}", field::CATEGORY_PREFIX, self.output_name),
            FieldRole::Tag => field::TAGS.to_string(),
        }
    }
}

/// A selector whose values feed the `tags` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSource {
    pub selector: String,
    /// Reserved tag-list selectors split delimited text on whitespace.
    pub splits_text: bool,
}

/// Validated, ordered view of a processor configuration.
#[derive(Debug, Clone)]
pub struct FieldMappingTable {
    time: FieldMapping,
    /// Identifiers, then measurements, then categories; each ordered by output name.
    values: Vec<FieldMapping>,
    tags: Vec<FieldMapping>,
    tag_sources: Vec<TagSource>,
}

impl FieldMappingTable {
    pub fn from_config(config: &ProcessorConfig) -> Result<Self, ConfigError> {
        let time_selector = config.time_selector.as_str();
        if time_selector.trim().is_empty() {
            return Err(ConfigError::EmptyTimeSelector);
        }
        if is_reserved_tag_selector(time_selector) {
            return Err(ConfigError::ReservedSelector {
                selector: time_selector.to_string(),
                role: FieldRole::Time,
            });
        }

        let mut claimed: HashMap<&str, FieldRole> = HashMap::new();
        claimed.insert(time_selector, FieldRole::Time);

        let mut values = Vec::new();
        let roles = [
            (FieldRole::Identifier, &config.identifiers),
            (FieldRole::Measurement, &config.measurements),
            (FieldRole::Category, &config.categories),
        ];

        // BTreeMap iteration already yields entries ordered by output name
        for (role, entries) in roles {
            for (output_name, selector) in entries {
                if output_name.is_empty() {
                    return Err(ConfigError::EmptyOutputName {
                        role,
                        selector: selector.clone(),
                    });
                }
                if selector.is_empty() {
                    return Err(ConfigError::EmptySelector {
                        role,
                        output_name: output_name.clone(),
                    });
                }
                if is_reserved_tag_selector(selector) {
                    return Err(ConfigError::ReservedSelector {
                        selector: selector.clone(),
                        role,
                    });
                }
                claim(&mut claimed, selector, role)?;
                values.push(FieldMapping::new(selector, output_name, role));
            }
        }

        let mut tags = Vec::new();
        for selector in &config.tags {
            if selector.is_empty() {
                return Err(ConfigError::EmptySelector {
                    role: FieldRole::Tag,
                    output_name: field::TAGS.to_string(),
                });
            }
            claim(&mut claimed, selector, FieldRole::Tag)?;
            tags.push(FieldMapping::new(selector, selector, FieldRole::Tag));
        }

        let mut tag_sources: Vec<TagSource> = tags
            .iter()
            .map(|m| TagSource {
                selector: m.source_selector.clone(),
                splits_text: is_reserved_tag_selector(&m.source_selector),
            })
            .collect();
        for reserved in RESERVED_TAG_SELECTORS {
            if !claimed.contains_key(reserved) {
                tag_sources.push(TagSource {
                    selector: reserved.to_string(),
                    splits_text: true,
                });
            }
        }

        Ok(Self {
            time: FieldMapping::new(time_selector, field::TIME, FieldRole::Time),
            values,
            tags,
            tag_sources,
        })
    }

    pub fn time_selector(&self) -> &str {
        &self.time.source_selector
    }

    /// Non-time, non-tag mappings in column order.
    pub fn value_fields(&self) -> &[FieldMapping] {
        &self.values
    }

    /// Tag sources in aggregation order: configured tags, then implicit reserved selectors.
    pub fn tag_sources(&self) -> &[TagSource] {
        &self.tag_sources
    }

    /// Every explicit mapping, time first.
    pub fn iter(&self) -> impl Iterator<Item = &FieldMapping> {
        std::iter::once(&self.time)
            .chain(self.values.iter())
            .chain(self.tags.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.values.len() + self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

fn claim<'a>(
    claimed: &mut HashMap<&'a str, FieldRole>,
    selector: &'a str,
    role: FieldRole,
) -> Result<(), ConfigError> {
    match claimed.get(selector) {
        Some(FieldRole::Time) => Err(ConfigError::TimeSelectorCollision {
            selector: selector.to_string(),
            role,
        }),
        Some(&first) => Err(ConfigError::DuplicateSelector {
            selector: selector.to_string(),
            first,
            second: role,
        }),
        None => {
            claimed.insert(selector, role);
            Ok(())
        }
    }
}
