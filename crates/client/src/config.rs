//! Configuration management for AMQ clients.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/amq/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use amq_protocol::{validate_system_id, Node};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MEMORY_PROVIDER;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("system_id must be exactly four decimal digits, got {0:?}")]
    InvalidSystemId(String),

    #[error("signing_secret must not be empty")]
    EmptySigningSecret,

    #[error("nodes.{0} is not a known node (expected biz, fund or opt)")]
    UnknownNode(String),

    #[error("nodes.{node}.provider must not be empty")]
    EmptyProvider { node: String },

    #[error("nodes.{node}.partitions must be at least 1, got {partitions}")]
    InvalidPartitions { node: String, partitions: u32 },

    #[error("nodes.{node}.listen_partitions contains {index}, but the node has {partitions} partition(s)")]
    InvalidListenPartition {
        node: String,
        index: u32,
        partitions: u32,
    },

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for an AMQ client process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Identity of this system.
    pub client: ClientConfig,

    /// Signing settings.
    pub security: SecurityConfig,

    /// Per-node connection settings, keyed by node name.
    pub nodes: BTreeMap<String, NodeConfig>,
}

/// Identity of this system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Four-digit system id used in this system's queue names.
    pub system_id: String,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Signing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Secret shared by every system that exchanges envelopes.
    pub signing_secret: String,
}

/// Connection settings for one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Registry name of the transport provider.
    pub provider: String,

    /// Number of queue partitions on this node.
    pub partitions: u32,

    /// Partitions this system consumes. Empty means all of them.
    pub listen_partitions: Vec<u32>,

    /// Provider specific parameters.
    pub parameters: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(Node::Biz.to_string(), NodeConfig::default());
        Self {
            client: ClientConfig::default(),
            security: SecurityConfig::default(),
            nodes,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            system_id: "0001".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            provider: MEMORY_PROVIDER.to_string(),
            partitions: 1,
            listen_partitions: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }
}

impl NodeConfig {
    /// Whether the node spreads queues over several partitions.
    pub fn is_partitioned(&self) -> bool {
        self.partitions > 1
    }

    /// Partitions this system consumes, resolving the empty default.
    pub fn effective_listen_partitions(&self) -> Vec<u32> {
        if self.listen_partitions.is_empty() {
            (0..self.partitions).collect()
        } else {
            self.listen_partitions.clone()
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("amq")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - AMQ_SYSTEM_ID: Override the system id
    /// - AMQ_SIGNING_SECRET: Override the signing secret
    /// - AMQ_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(system_id) = std::env::var("AMQ_SYSTEM_ID") {
            if !system_id.is_empty() {
                tracing::info!("Overriding system_id from environment: {}", system_id);
                self.client.system_id = system_id;
            }
        }

        if let Ok(secret) = std::env::var("AMQ_SIGNING_SECRET") {
            if !secret.is_empty() {
                tracing::info!("Overriding signing_secret from environment");
                self.security.signing_secret = secret;
            }
        }

        if let Ok(level) = std::env::var("AMQ_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.client.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if validate_system_id(&self.client.system_id).is_err() {
            return Err(ConfigError::InvalidSystemId(self.client.system_id.clone()));
        }

        if self.security.signing_secret.is_empty() {
            return Err(ConfigError::EmptySigningSecret);
        }

        for (name, node) in &self.nodes {
            if name.parse::<Node>().is_err() {
                return Err(ConfigError::UnknownNode(name.clone()));
            }
            if node.provider.is_empty() {
                return Err(ConfigError::EmptyProvider { node: name.clone() });
            }
            if node.partitions == 0 {
                return Err(ConfigError::InvalidPartitions {
                    node: name.clone(),
                    partitions: node.partitions,
                });
            }
            if let Some(&index) = node
                .listen_partitions
                .iter()
                .find(|&&index| index >= node.partitions)
            {
                return Err(ConfigError::InvalidListenPartition {
                    node: name.clone(),
                    index,
                    partitions: node.partitions,
                });
            }
        }

        let level = self.client.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.client.log_level.clone()));
        }

        Ok(())
    }

    /// Settings for `node`, if configured.
    pub fn node(&self, node: Node) -> Option<&NodeConfig> {
        self.nodes.get(node.as_str())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.security.signing_secret = "s3cret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.client.system_id, "0001");
        assert_eq!(config.client.log_level, "info");
        assert!(config.security.signing_secret.is_empty());
        let biz = config.node(Node::Biz).unwrap();
        assert_eq!(biz.provider, "memory");
        assert_eq!(biz.partitions, 1);
        assert!(config.node(Node::Fund).is_none());
    }

    #[test]
    fn test_default_requires_secret() {
        assert_eq!(
            Config::default().validate(),
            Err(ConfigError::EmptySigningSecret)
        );
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[client]
system_id = "0042"
log_level = "debug"

[security]
signing_secret = "shared"

[nodes.fund]
provider = "memory"
partitions = 4
listen_partitions = [1, 3]

[nodes.fund.parameters]
broker_url = "localhost:5672"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.client.system_id, "0042");
        assert_eq!(config.security.signing_secret, "shared");
        assert!(config.node(Node::Biz).is_none());
        let fund = config.node(Node::Fund).unwrap();
        assert_eq!(fund.partitions, 4);
        assert!(fund.is_partitioned());
        assert_eq!(fund.effective_listen_partitions(), vec![1, 3]);
        assert_eq!(
            fund.parameters.get("broker_url").map(String::as_str),
            Some("localhost:5672")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_node_defaults_fill_in() {
        let config = Config::from_toml("[nodes.opt]\npartitions = 3\n").unwrap();
        let opt = config.node(Node::Opt).unwrap();
        assert_eq!(opt.provider, "memory");
        assert_eq!(opt.effective_listen_partitions(), vec![0, 1, 2]);
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let err = Config::from_toml("[client\nsystem_id = \"0001\"").unwrap_err();
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_from_toml_wrong_type() {
        assert!(Config::from_toml("[nodes.biz]\npartitions = \"two\"\n").is_err());
    }

    #[test]
    fn test_validate_system_id() {
        let mut config = valid_config();
        config.client.system_id = "12".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidSystemId("12".to_string()))
        );
    }

    #[test]
    fn test_validate_unknown_node() {
        let mut config = valid_config();
        config
            .nodes
            .insert("payments".to_string(), NodeConfig::default());
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownNode("payments".to_string()))
        );
    }

    #[test]
    fn test_validate_partitions() {
        let mut config = valid_config();
        config.nodes.get_mut("biz").unwrap().partitions = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPartitions { partitions: 0, .. })
        ));

        let biz = config.nodes.get_mut("biz").unwrap();
        biz.partitions = 2;
        biz.listen_partitions = vec![0, 2];
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidListenPartition {
                node: "biz".to_string(),
                index: 2,
                partitions: 2,
            })
        );
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = valid_config();
        config.client.log_level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.client.log_level = "verbose".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );
    }

    #[test]
    fn test_roundtrip() {
        let mut original = valid_config();
        original.nodes.insert(
            "fund".to_string(),
            NodeConfig {
                partitions: 2,
                listen_partitions: vec![1],
                ..NodeConfig::default()
            },
        );
        let loaded = Config::from_toml(&original.to_toml().unwrap()).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = valid_config();
        config.save(&path).unwrap();
        assert!(path.exists());

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("AMQ_SYSTEM_ID", "0777");
        std::env::set_var("AMQ_SIGNING_SECRET", "from-env");
        std::env::set_var("AMQ_LOG_LEVEL", "trace");

        let mut config = Config::default();
        config.apply_env_overrides();

        std::env::remove_var("AMQ_SYSTEM_ID");
        std::env::remove_var("AMQ_SIGNING_SECRET");
        std::env::remove_var("AMQ_LOG_LEVEL");

        assert_eq!(config.client.system_id, "0777");
        assert_eq!(config.security.signing_secret, "from-env");
        assert_eq!(config.client.log_level, "trace");
    }

    #[test]
    #[serial]
    fn test_empty_env_is_ignored() {
        std::env::set_var("AMQ_SYSTEM_ID", "");

        let mut config = Config::default();
        config.apply_env_overrides();

        std::env::remove_var("AMQ_SYSTEM_ID");
        assert_eq!(config.client.system_id, "0001");
    }
}
