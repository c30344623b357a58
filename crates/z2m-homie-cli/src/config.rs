//! Application configuration file.
//!
//! ```toml
//! discovery_timeout_secs = 10
//!
//! [bridge]
//! bridge_id = "zigbee2mqtt-bridge"
//! z2m_base_topic = "zigbee2mqtt"
//!
//! [mqtt]
//! broker = "localhost"
//! port = 1883
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use z2m_homie_bridge::MqttConfig;
use z2m_homie_core::BridgeConfig;

fn default_discovery_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,

    /// How long to wait for the Zigbee2MQTT device list before giving up.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            mqtt: MqttConfig::default(),
            discovery_timeout_secs: default_discovery_timeout(),
        }
    }
}

impl AppConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn with_env_overrides(self) -> Self {
        Self {
            bridge: self.bridge.with_env_overrides(),
            mqtt: self.mqtt.with_env_overrides(),
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bridge
            .validate()
            .context("Invalid bridge configuration")?;
        if self.mqtt.broker.trim().is_empty() {
            anyhow::bail!("MQTT broker must not be empty");
        }
        Ok(())
    }
}
