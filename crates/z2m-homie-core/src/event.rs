//! Event types flowing from the Zigbee host into the Homie bridge.
//!
//! The host (device driver layer) publishes these events on the event bus,
//! the bridge consumes them through its handler registration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a driver-level entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRef {
    /// A single Zigbee device, keyed by its IEEE address.
    Device { ieee_address: String },
    /// A Zigbee group.
    Group { id: u16 },
}

impl EntityRef {
    /// Create a device reference.
    pub fn device(ieee_address: impl Into<String>) -> Self {
        Self::Device {
            ieee_address: ieee_address.into(),
        }
    }

    /// Create a group reference.
    pub fn group(id: u16) -> Self {
        Self::Group { id }
    }

    /// IEEE address if this is a device.
    pub fn ieee_address(&self) -> Option<&str> {
        match self {
            Self::Device { ieee_address } => Some(ieee_address),
            Self::Group { .. } => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device { ieee_address } => write!(f, "device {}", ieee_address),
            Self::Group { id } => write!(f, "group {}", id),
        }
    }
}

/// Event consumed by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    /// An MQTT message routed to the bridge (e.g. a Homie `/set` command).
    MqttMessage {
        topic: String,
        payload: String,
        timestamp: i64,
    },

    /// Live state of an entity changed.
    ///
    /// `changed` holds only the keys whose value differs from the previous
    /// snapshot.
    DeviceStateChanged {
        entity: EntityRef,
        changed: serde_json::Map<String, serde_json::Value>,
        timestamp: i64,
    },
}

impl BridgeEvent {
    /// Create an MQTT message event stamped with the current time.
    pub fn mqtt_message(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::MqttMessage {
            topic: topic.into(),
            payload: payload.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Create a state-change event stamped with the current time.
    pub fn state_changed(
        entity: EntityRef,
        changed: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self::DeviceStateChanged {
            entity,
            changed,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Get the event type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::MqttMessage { .. } => "MqttMessage",
            Self::DeviceStateChanged { .. } => "DeviceStateChanged",
        }
    }

    /// Get the event timestamp.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::MqttMessage { timestamp, .. } | Self::DeviceStateChanged { timestamp, .. } => {
                *timestamp
            }
        }
    }

    /// Check if this is an inbound MQTT message.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::MqttMessage { .. })
    }

    /// Check if this is a state change.
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::DeviceStateChanged { .. })
    }
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MqttMessage { topic, .. } => write!(f, "MqttMessage({})", topic),
            Self::DeviceStateChanged {
                entity, changed, ..
            } => write!(f, "DeviceStateChanged({}, {} keys)", entity, changed.len()),
        }
    }
}

/// Metadata attached to every event on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub event_id: String,
    /// Event source (component that published)
    pub source: String,
    /// Event timestamp
    pub timestamp: i64,
}

impl EventMetadata {
    /// Create new event metadata.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_ref() {
        let device = EntityRef::device("0x00124b0001");
        assert_eq!(device.ieee_address(), Some("0x00124b0001"));
        assert_eq!(device.to_string(), "device 0x00124b0001");

        let group = EntityRef::group(7);
        assert_eq!(group.ieee_address(), None);
        assert_eq!(group.to_string(), "group 7");
    }

    #[test]
    fn test_event_type_names() {
        let msg = BridgeEvent::mqtt_message("homie/5/z2m-a/primary/state/set", "true");
        assert_eq!(msg.type_name(), "MqttMessage");
        assert!(msg.is_message());

        let mut changed = serde_json::Map::new();
        changed.insert("state".to_string(), json!("ON"));
        let change = BridgeEvent::state_changed(EntityRef::device("0x01"), changed);
        assert_eq!(change.type_name(), "DeviceStateChanged");
        assert!(change.is_state_change());
        assert_eq!(change.to_string(), "DeviceStateChanged(device 0x01, 1 keys)");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = BridgeEvent::MqttMessage {
            topic: "t".to_string(),
            payload: "p".to_string(),
            timestamp: 5,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "MqttMessage");
        assert_eq!(value["timestamp"], 5);
    }
}
