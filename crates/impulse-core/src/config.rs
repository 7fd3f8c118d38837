//! Configuration loading and typed config structures for the impulse engine.
//!
//! The canonical configuration lives in `impulse-config.yaml` at the
//! project root. Every section and field has a default, so an empty file
//! (or no file) yields a working engine. Values are validated on load.

use std::path::Path;

use impulse_actions::{ActionCatalog, ResolutionPolicy};
use impulse_needs::NeedConfig;
use serde::{Deserialize, Serialize};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The content parsed but holds values the engine cannot honor.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `impulse-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Periodic sweep settings.
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Need defaults and frustration tunables.
    #[serde(default)]
    pub needs: NeedConfig,

    /// Consequences applied by the resolver.
    #[serde(default)]
    pub resolution: ResolutionPolicy,

    /// Action type to defaults table. A present section replaces the
    /// built-in table entirely.
    #[serde(default)]
    pub actions: ActionCatalog,

    /// Logging output settings, read by the binary.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// RNG seed for reproducible resolution. Drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the engine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { reason };
        self.needs.validate().map_err(|e| invalid(e.to_string()))?;
        self.actions.validate().map_err(|e| invalid(e.to_string()))?;
        if self.sweep.interval_secs == 0 {
            return Err(invalid(String::from("sweep.interval_secs must be at least 1")));
        }
        if self.sweep.max_concurrent_agents == 0 {
            return Err(invalid(String::from(
                "sweep.max_concurrent_agents must be at least 1",
            )));
        }
        let r = &self.resolution;
        for (name, value) in [
            ("wasted_resource_penalty", r.wasted_resource_penalty),
            ("failure_frustration", r.failure_frustration),
            ("failure_block_hours", r.failure_block_hours),
            ("reset_effectiveness", r.reset_effectiveness),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("resolution.{name} must be non-negative")));
            }
        }
        Ok(())
    }
}

/// Periodic sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweep passes (default: 300).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Agents evaluated concurrently within one pass (default: 8).
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    /// Extra attempts after a transient collaborator failure (default: 1).
    #[serde(default = "default_collaborator_retries")]
    pub collaborator_retries: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_concurrent_agents: default_max_concurrent_agents(),
            collaborator_retries: default_collaborator_retries(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_max_concurrent_agents() -> usize {
    8
}

const fn default_collaborator_retries() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use impulse_types::{ActionType, NeedType};

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweep.interval_secs, 300);
        assert_eq!(config.sweep.max_concurrent_agents, 8);
        assert_eq!(config.sweep.collaborator_retries, 1);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.seed.is_none());
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(EngineConfig::parse("").is_ok());
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = "
sweep:
  interval_secs: 60
resolution:
  failure_block_hours: 0
logging:
  format: json
seed: 42
";
        let config = EngineConfig::parse(yaml).ok().unwrap_or_default();
        assert_eq!(config.sweep.interval_secs, 60);
        assert_eq!(config.sweep.max_concurrent_agents, 8);
        assert!(config.resolution.failure_block_hours.abs() < f64::EPSILON);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.needs.defaults.len(), NeedType::ALL.len());
        assert!(config.actions.get(ActionType::Rest).is_ok());
    }

    #[test]
    fn actions_section_replaces_catalog() {
        let yaml = "
actions:
  rest:
    resource_cost: 0
    success_probability: 100
    addresses: [rest]
";
        let config = EngineConfig::parse(yaml).ok().unwrap_or_default();
        assert!(config.actions.get(ActionType::Rest).is_ok());
        assert!(config.actions.get(ActionType::Explore).is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad_probability = "
actions:
  rest:
    resource_cost: 0
    success_probability: 120
";
        assert!(matches!(
            EngineConfig::parse(bad_probability),
            Err(ConfigError::Invalid { .. })
        ));

        let bad_max = "
needs:
  defaults:
    energy: { max_value: 0, growth_rate: 1, priority: 1, threshold: 50 }
";
        assert!(matches!(
            EngineConfig::parse(bad_max),
            Err(ConfigError::Invalid { .. })
        ));

        assert!(matches!(
            EngineConfig::parse("sweep:\n  interval_secs: 0\n"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(matches!(
            EngineConfig::parse("sweep: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("impulse-config.yaml");
        if path.exists() {
            let config = EngineConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
