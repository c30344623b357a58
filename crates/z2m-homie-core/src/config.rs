//! Configuration defaults, environment variables and the bridge config.
//!
//! All crates take their defaults from here so the topic layout is defined
//! in exactly one place.

use serde::{Deserialize, Serialize};

/// Default values.
pub mod defaults {
    /// Homie id of the bridge (root) device.
    pub const BRIDGE_ID: &str = "zigbee2mqtt-bridge";
    /// Friendly name of the bridge device.
    pub const BRIDGE_NAME: &str = "Zigbee2MQTT Bridge";
    /// Prefix prepended to a Zigbee IEEE address to form a Homie device id.
    pub const DEVICE_PREFIX: &str = "z2m-";
    /// Homie topic prefix (domain).
    pub const HOMIE_PREFIX: &str = "homie";
    /// Homie convention major version used as topic segment.
    pub const HOMIE_VERSION: &str = "5";
    /// Zigbee2MQTT base topic.
    pub const Z2M_BASE_TOPIC: &str = "zigbee2mqtt";
}

/// Environment variable names.
pub mod env_vars {
    pub const BRIDGE_ID: &str = "Z2M_HOMIE_BRIDGE_ID";
    pub const BRIDGE_NAME: &str = "Z2M_HOMIE_BRIDGE_NAME";
    pub const DEVICE_PREFIX: &str = "Z2M_HOMIE_DEVICE_PREFIX";
    pub const HOMIE_PREFIX: &str = "Z2M_HOMIE_PREFIX";
    pub const Z2M_BASE_TOPIC: &str = "Z2M_HOMIE_BASE_TOPIC";
    pub const MQTT_BROKER: &str = "Z2M_HOMIE_MQTT_BROKER";
    pub const MQTT_PORT: &str = "Z2M_HOMIE_MQTT_PORT";
    pub const MQTT_USERNAME: &str = "Z2M_HOMIE_MQTT_USERNAME";
    pub const MQTT_PASSWORD: &str = "Z2M_HOMIE_MQTT_PASSWORD";
    pub const LOG_JSON: &str = "Z2M_HOMIE_LOG_JSON";

    /// Read a non-empty environment variable.
    pub fn get(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Read and parse an environment variable, ignoring unparsable values.
    pub fn parse<T: std::str::FromStr>(name: &str) -> Option<T> {
        get(name).and_then(|v| v.trim().parse().ok())
    }
}

/// Bridge topology and naming configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Homie id of the bridge device
    pub bridge_id: String,
    /// Friendly name published in the bridge description
    pub bridge_name: String,
    /// Prefix for represented device ids
    pub device_prefix: String,
    /// Homie topic prefix (e.g. `homie`)
    pub homie_prefix: String,
    /// Homie convention version segment (e.g. `5`)
    pub homie_version: String,
    /// Zigbee2MQTT base topic
    pub z2m_base_topic: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_id: defaults::BRIDGE_ID.to_string(),
            bridge_name: defaults::BRIDGE_NAME.to_string(),
            device_prefix: defaults::DEVICE_PREFIX.to_string(),
            homie_prefix: defaults::HOMIE_PREFIX.to_string(),
            homie_version: defaults::HOMIE_VERSION.to_string(),
            z2m_base_topic: defaults::Z2M_BASE_TOPIC.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Topic namespace every Homie topic lives under, e.g. `homie/5`.
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.homie_prefix, self.homie_version)
    }

    /// Homie device id for a Zigbee IEEE address.
    pub fn device_id(&self, ieee_address: &str) -> String {
        format!("{}{}", self.device_prefix, ieee_address)
    }

    /// Strip the device prefix from a Homie device id.
    pub fn ieee_from_device_id<'a>(&self, device_id: &'a str) -> Option<&'a str> {
        device_id
            .strip_prefix(&self.device_prefix)
            .filter(|rest| !rest.is_empty())
    }

    /// Apply overrides from environment variables.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_vars::get(env_vars::BRIDGE_ID) {
            self.bridge_id = v;
        }
        if let Some(v) = env_vars::get(env_vars::BRIDGE_NAME) {
            self.bridge_name = v;
        }
        if let Some(v) = env_vars::get(env_vars::DEVICE_PREFIX) {
            self.device_prefix = v;
        }
        if let Some(v) = env_vars::get(env_vars::HOMIE_PREFIX) {
            self.homie_prefix = v;
        }
        if let Some(v) = env_vars::get(env_vars::Z2M_BASE_TOPIC) {
            self.z2m_base_topic = v;
        }
        self
    }

    /// Check the configuration for values that would produce invalid topics.
    pub fn validate(&self) -> crate::error::Result<()> {
        let fields = [
            ("bridge_id", &self.bridge_id),
            ("device_prefix", &self.device_prefix),
            ("homie_prefix", &self.homie_prefix),
            ("homie_version", &self.homie_version),
            ("z2m_base_topic", &self.z2m_base_topic),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(crate::config_err!("{} must not be empty", field));
            }
            if value.contains(['+', '#']) {
                return Err(crate::config_err!(
                    "{} must not contain MQTT wildcards: {}",
                    field,
                    value
                ));
            }
        }
        if self.bridge_id.contains('/') || self.device_prefix.contains('/') {
            return Err(crate::config_err!(
                "bridge_id and device_prefix must be single topic segments"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.namespace(), "homie/5");
        assert_eq!(config.bridge_id, "zigbee2mqtt-bridge");
        assert_eq!(config.device_id("0xabc"), "z2m-0xabc");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ieee_from_device_id() {
        let config = BridgeConfig::default();
        assert_eq!(config.ieee_from_device_id("z2m-0xabc"), Some("0xabc"));
        assert_eq!(config.ieee_from_device_id("other-0xabc"), None);
        assert_eq!(config.ieee_from_device_id("z2m-"), None);
    }

    #[test]
    fn test_validate_rejects_wildcards() {
        let config = BridgeConfig {
            bridge_id: "bridge/#".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BridgeConfig {
            device_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"bridge_id": "my-bridge"}"#).unwrap();
        assert_eq!(config.bridge_id, "my-bridge");
        assert_eq!(config.device_prefix, defaults::DEVICE_PREFIX);
    }
}
