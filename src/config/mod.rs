//! Configuration schema (spec §4.6): manager settings, output specs, and
//! global settings, all `serde`-(de)serializable. This module only defines
//! and validates the schema — loading it from a file or watching it for
//! changes is explicitly out of scope (spec §1).

use crate::filter::factory::FilterFactory;
use crate::filter::FilterConfig;
use crate::level::Severity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the output manager dispatches a record to its sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Sequential,
    Parallel,
    /// Dispatches through the async worker pool (spec §4.4, §9 open
    /// question resolved by actually implementing the pool rather than
    /// silently degrading to `Sequential`; see `output::manager`).
    Async,
}

/// Settings governing the output manager as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSettings {
    pub write_mode: WriteMode,
    pub async_queue_size: usize,
    pub worker_count: usize,
    #[serde(with = "duration_millis")]
    pub write_timeout: Duration,
    pub fail_fast: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            write_mode: WriteMode::Sequential,
            async_queue_size: 1024,
            worker_count: 4,
            write_timeout: Duration::from_secs(5),
            fail_fast: false,
        }
    }
}

/// A formatter's type tag plus its type-specific config, the same
/// {type, config} shape a `FilterConfig` uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// One sink's configuration: identity, enablement, gate level, type-specific
/// settings, and optional formatter/filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub enabled: bool,
    pub min_level: Severity,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub formatter: Option<FormatterSpec>,
    #[serde(default)]
    pub filter: Option<FilterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub enabled: bool,
    pub min_level: Severity,
    pub config_version: u32,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings { enabled: true, min_level: Severity::Info, config_version: 1 }
    }
}

/// The full config document: global settings, manager settings, and the
/// output list, all round-tripping through JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub global: GlobalSettings,
    pub manager: ManagerSettings,
    pub outputs: Vec<OutputSpec>,
}

#[derive(Debug, Clone)]
pub enum ConfigError {
    UnknownOutputType(String),
    UnknownFormatterType(String),
    InvalidFilter(String),
    DuplicateOutputName(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownOutputType(t) => write!(f, "unknown output type '{t}'"),
            ConfigError::UnknownFormatterType(t) => write!(f, "unknown formatter type '{t}'"),
            ConfigError::InvalidFilter(detail) => write!(f, "invalid filter config: {detail}"),
            ConfigError::DuplicateOutputName(name) => write!(f, "duplicate output name '{name}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

const KNOWN_OUTPUT_TYPES: &[&str] = &["console", "file"];
const KNOWN_FORMATTER_TYPES: &[&str] = &["raw", "json", "template"];

impl Config {
    /// Serializes this config to its JSON text form.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("config serializes")
    }

    /// Parses a config document from its JSON text form. Unknown optional
    /// fields are ignored by `serde`'s default behavior; this does not yet
    /// validate type names (call `validate()` for that).
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Checks that every output/formatter type name is registered and every
    /// filter config is well-formed, and that output names are unique
    /// within the document. An unknown type name is an error; a known type
    /// with invalid config is an error (spec §4.6).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = ahash::AHashSet::new();
        for output in &self.outputs {
            if !seen.insert(&output.name) {
                return Err(ConfigError::DuplicateOutputName(output.name.clone()));
            }
            if !KNOWN_OUTPUT_TYPES.contains(&output.type_name.as_str()) {
                return Err(ConfigError::UnknownOutputType(output.type_name.clone()));
            }
            if let Some(formatter) = &output.formatter {
                if !KNOWN_FORMATTER_TYPES.contains(&formatter.type_name.as_str()) {
                    return Err(ConfigError::UnknownFormatterType(formatter.type_name.clone()));
                }
            }
            if let Some(filter) = &output.filter {
                FilterFactory::global().create(filter).map_err(|e| ConfigError::InvalidFilter(e.to_string()))?;
            }
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::leaf::LevelFilter;
    use crate::filter::Filter;

    fn sample_config() -> Config {
        Config {
            global: GlobalSettings::default(),
            manager: ManagerSettings::default(),
            outputs: vec![OutputSpec {
                name: "console".into(),
                type_name: "console".into(),
                enabled: true,
                min_level: Severity::Warning,
                config: serde_json::json!({ "stderr_threshold": "WARNING" }),
                formatter: Some(FormatterSpec { type_name: "template".into(), config: serde_json::json!({}) }),
                filter: Some(LevelFilter::at_least(Severity::Info).serialize()),
            }],
        }
    }

    #[test]
    fn round_trips_through_json() {
        let config = sample_config();
        let json = config.to_json();
        let restored = Config::from_json(&json).unwrap();
        assert_eq!(restored.outputs.len(), 1);
        assert_eq!(restored.outputs[0].name, "console");
        assert_eq!(restored.manager.worker_count, config.manager.worker_count);
    }

    #[test]
    fn validate_accepts_known_types() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_output_type() {
        let mut config = sample_config();
        config.outputs[0].type_name = "carrier-pigeon".into();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownOutputType(_))));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut config = sample_config();
        let dup = config.outputs[0].clone();
        config.outputs.push(dup);
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateOutputName(_))));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "global": {"enabled": true, "min_level": "INFO", "config_version": 1, "mystery_field": 42},
            "manager": {"write_mode": "sequential", "async_queue_size": 10, "worker_count": 1, "write_timeout": 1000, "fail_fast": false},
            "outputs": []
        }"#;
        assert!(Config::from_json(json).is_ok());
    }
}
