//! Configuration for the port subsystem.
//!
//! Settings can be loaded from YAML or JSON files, or assembled with
//! [`PortsConfigBuilder`].
//!
//! # Configuration File Structure
//!
//! ```yaml
//! ports:
//!   lookahead_margin: 3
//!   events_enabled: true
//!   skid_accumulation: warn
//!   stall_accumulation: error
//!   log_level: debug
//!
//! remote:
//!   timeout_ms: 500
//!   spin_limit: 6
//!
//! channels:
//!   - name: fetch_to_decode
//!     instance: 0
//!     bandwidth: 4
//!     latency: 2
//! ```
//!
//! A `channels` entry acts like a config endpoint: it supplies bandwidth and
//! latency to a channel whose endpoints leave them unset.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::remote::WaitOptions;
use crate::storage::{AccumulationPolicy, LOOKAHEAD_MARGIN};
use crate::types::InstanceId;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Storage and connection parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortsParams {
    /// Rows added to every ring beyond `latency + 1`
    #[serde(default = "default_lookahead_margin")]
    pub lookahead_margin: usize,

    /// Whether connected storages report item moves to the event sink
    #[serde(default)]
    pub events_enabled: bool,

    /// Over-accumulation policy of skid readers
    #[serde(default = "default_skid_accumulation")]
    pub skid_accumulation: AccumulationPolicy,

    /// Over-accumulation policy of stall readers
    #[serde(default = "default_stall_accumulation")]
    pub stall_accumulation: AccumulationPolicy,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_lookahead_margin() -> usize {
    LOOKAHEAD_MARGIN
}

fn default_skid_accumulation() -> AccumulationPolicy {
    AccumulationPolicy::Warn
}

fn default_stall_accumulation() -> AccumulationPolicy {
    AccumulationPolicy::Error
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PortsParams {
    fn default() -> Self {
        Self {
            lookahead_margin: default_lookahead_margin(),
            events_enabled: false,
            skid_accumulation: default_skid_accumulation(),
            stall_accumulation: default_stall_accumulation(),
            log_level: default_log_level(),
        }
    }
}

/// Defaults for bounded cross-thread waits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteParams {
    /// Wait deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff steps spent spinning before yielding the thread
    #[serde(default = "default_spin_limit")]
    pub spin_limit: u32,
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_spin_limit() -> u32 {
    6
}

impl Default for RemoteParams {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            spin_limit: default_spin_limit(),
        }
    }
}

impl RemoteParams {
    /// Builds wait options from these defaults.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::new(Duration::from_millis(self.timeout_ms)).with_spin_limit(self.spin_limit)
    }
}

/// Static parameters of one channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name
    pub name: String,

    /// Channel instance
    #[serde(default)]
    pub instance: InstanceId,

    /// Items per cycle row
    pub bandwidth: u32,

    /// Cycles between write and earliest read
    pub latency: u32,
}

/// Complete port subsystem configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortsConfig {
    /// Storage and connection parameters
    #[serde(default)]
    pub ports: PortsParams,

    /// Remote wait defaults
    #[serde(default)]
    pub remote: RemoteParams,

    /// Static channel parameters
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl PortsConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: PortsConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: PortsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for ch in &self.channels {
            if ch.name.is_empty() {
                return Err(ConfigError::Validation(
                    "Channel entry without a name".to_string(),
                ));
            }
            if ch.bandwidth == 0 {
                return Err(ConfigError::Validation(format!(
                    "Channel {}[{}] has zero bandwidth",
                    ch.name, ch.instance
                )));
            }
            if !seen.insert((ch.name.as_str(), ch.instance)) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate channel entry: {}[{}]",
                    ch.name, ch.instance
                )));
            }
        }

        if self.remote.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "remote.timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the number of static channel entries.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Finds the static parameters of a channel.
    pub fn find_channel(&self, name: &str, instance: InstanceId) -> Option<&ChannelConfig> {
        self.channels
            .iter()
            .find(|ch| ch.name == name && ch.instance == instance)
    }

    /// Policy applied by skid readers or stall readers.
    pub fn accumulation_policy(&self, stall: bool) -> AccumulationPolicy {
        if stall {
            self.ports.stall_accumulation
        } else {
            self.ports.skid_accumulation
        }
    }
}

/// Builder for creating PortsConfig programmatically.
#[derive(Default)]
pub struct PortsConfigBuilder {
    config: PortsConfig,
}

impl PortsConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lookahead margin of every ring.
    pub fn lookahead_margin(mut self, margin: usize) -> Self {
        self.config.ports.lookahead_margin = margin;
        self
    }

    /// Enables item-move events.
    pub fn events_enabled(mut self, enable: bool) -> Self {
        self.config.ports.events_enabled = enable;
        self
    }

    /// Sets the over-accumulation policy of skid readers.
    pub fn skid_accumulation(mut self, policy: AccumulationPolicy) -> Self {
        self.config.ports.skid_accumulation = policy;
        self
    }

    /// Sets the over-accumulation policy of stall readers.
    pub fn stall_accumulation(mut self, policy: AccumulationPolicy) -> Self {
        self.config.ports.stall_accumulation = policy;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.ports.log_level = level.into();
        self
    }

    /// Sets the remote wait deadline.
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.config.remote.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Adds static channel parameters.
    pub fn add_channel(
        mut self,
        name: impl Into<String>,
        instance: InstanceId,
        bandwidth: u32,
        latency: u32,
    ) -> Self {
        self.config.channels.push(ChannelConfig {
            name: name.into(),
            instance,
            bandwidth,
            latency,
        });
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<PortsConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PortsConfig::new();
        assert_eq!(config.ports.lookahead_margin, 3);
        assert!(!config.ports.events_enabled);
        assert_eq!(config.ports.skid_accumulation, AccumulationPolicy::Warn);
        assert_eq!(config.ports.stall_accumulation, AccumulationPolicy::Error);
        assert_eq!(config.remote.timeout_ms, 1000);
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
ports:
  lookahead_margin: 5
  events_enabled: true
  stall_accumulation: warn
  log_level: debug

remote:
  timeout_ms: 250

channels:
  - name: fetch_to_decode
    bandwidth: 4
    latency: 2
  - name: fetch_to_decode
    instance: 1
    bandwidth: 2
    latency: 1
"#;

        let config = PortsConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.ports.lookahead_margin, 5);
        assert!(config.ports.events_enabled);
        assert_eq!(config.ports.stall_accumulation, AccumulationPolicy::Warn);
        assert_eq!(config.ports.skid_accumulation, AccumulationPolicy::Warn);
        assert_eq!(config.remote.timeout_ms, 250);
        assert_eq!(config.remote.spin_limit, 6);
        assert_eq!(config.channel_count(), 2);
        assert_eq!(config.find_channel("fetch_to_decode", 1).unwrap().bandwidth, 2);
        assert!(config.find_channel("fetch_to_decode", 2).is_none());
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"{
            "ports": { "skid_accumulation": "off" },
            "channels": [
                {"name": "retire", "instance": 0, "bandwidth": 1, "latency": 0}
            ]
        }"#;

        let config = PortsConfig::from_json(json).unwrap();
        assert_eq!(config.ports.skid_accumulation, AccumulationPolicy::Off);
        assert_eq!(config.accumulation_policy(false), AccumulationPolicy::Off);
        assert_eq!(config.channels[0].latency, 0);
    }

    #[test]
    fn test_builder() {
        let config = PortsConfigBuilder::new()
            .lookahead_margin(1)
            .events_enabled(true)
            .remote_timeout(Duration::from_millis(20))
            .add_channel("a", 0, 2, 3)
            .build()
            .unwrap();

        assert_eq!(config.ports.lookahead_margin, 1);
        assert_eq!(config.remote.timeout_ms, 20);
        assert_eq!(config.remote.wait_options().timeout(), Duration::from_millis(20));
        assert_eq!(config.channel_count(), 1);
    }

    #[test]
    fn test_builder_saturates_huge_timeout() {
        let config = PortsConfigBuilder::new()
            .remote_timeout(Duration::MAX)
            .build()
            .unwrap();
        assert_eq!(config.remote.timeout_ms, u64::MAX);
    }

    #[test]
    fn test_validation_duplicate_channel() {
        let yaml = r#"
channels:
  - name: a
    bandwidth: 1
    latency: 1
  - name: a
    bandwidth: 2
    latency: 1
"#;
        assert!(matches!(
            PortsConfig::from_yaml(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_zero_bandwidth() {
        let result = PortsConfigBuilder::new().add_channel("a", 0, 0, 1).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_format() {
        let result = PortsConfig::from_file("ports.toml");
        assert!(matches!(result, Err(ConfigError::UnknownFormat(ext)) if ext == "toml"));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = PortsConfigBuilder::new()
            .stall_accumulation(AccumulationPolicy::Off)
            .add_channel("x", 2, 8, 4)
            .build()
            .unwrap();

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("stall_accumulation: off"));
        let restored = PortsConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config, restored);
    }
}
