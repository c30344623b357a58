//! Interfaces the bridge consumes from the Zigbee host.

use crate::transport::TransportError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use z2m_homie_devices::{Entity, ZigbeeDevice};

/// Live key/value state of a device.
pub type DeviceStateMap = Map<String, Value>;

/// Host errors.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The device list is not available (yet).
    #[error("Device list unavailable: {0}")]
    Unavailable(String),

    #[error("Command failed for {device}: {message}")]
    Command { device: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Known devices, and lookup of an entity by id.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// All devices, in host order.
    async fn devices(&self) -> Result<Vec<ZigbeeDevice>, HostError>;

    /// Resolve an IEEE address or friendly name.
    async fn resolve(&self, id: &str) -> Option<Entity>;
}

/// Current state of a device.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn snapshot(&self, device: &ZigbeeDevice) -> Result<DeviceStateMap, HostError>;
}

/// Commands towards a device.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send_command(
        &self,
        device: &ZigbeeDevice,
        property: &str,
        value: Value,
    ) -> Result<(), HostError>;
}
