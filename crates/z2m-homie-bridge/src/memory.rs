//! In-memory transport and host.
//!
//! Used to drive the bridge without a broker, e.g. in tests or for a dry run.

use crate::host::{CommandSink, DeviceSource, DeviceStateMap, HostError, StateStore};
use crate::transport::{HomieTransport, PublishOptions, Qos, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use z2m_homie_devices::{Entity, ZigbeeDevice, ZigbeeGroup};

/// A message handed to a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: Qos,
    pub retain: bool,
    /// Sent through the awaited `publish`, not `try_publish`
    pub awaited: bool,
}

/// Transport that records every call.
#[derive(Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<Published>>,
    subscriptions: Mutex<Vec<(String, Qos)>>,
    failing: Mutex<Vec<String>>,
    ended: Mutex<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish to a topic containing `pattern` fail.
    pub fn fail_topics_containing(&self, pattern: impl Into<String>) {
        self.failing.lock().push(pattern.into());
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().clone()
    }

    /// Payloads published to exactly `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    /// Last message published to exactly `topic`.
    pub fn last(&self, topic: &str) -> Option<Published> {
        self.published
            .lock()
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .cloned()
    }

    pub fn subscriptions(&self) -> Vec<(String, Qos)> {
        self.subscriptions.lock().clone()
    }

    pub fn is_ended(&self) -> bool {
        *self.ended.lock()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }

    fn record(
        &self,
        topic: &str,
        payload: String,
        options: PublishOptions,
        awaited: bool,
    ) -> Result<(), TransportError> {
        if self.failing.lock().iter().any(|p| topic.contains(p.as_str())) {
            return Err(TransportError::publish(topic, "injected failure"));
        }
        self.published.lock().push(Published {
            topic: topic.to_string(),
            payload,
            qos: options.qos,
            retain: options.retain,
            awaited,
        });
        Ok(())
    }
}

#[async_trait]
impl HomieTransport for MemoryTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), TransportError> {
        self.record(topic, payload, options, true)
    }

    fn try_publish(
        &self,
        topic: &str,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), TransportError> {
        self.record(topic, payload, options, false)
    }

    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), TransportError> {
        self.subscriptions.lock().push((topic.to_string(), qos));
        Ok(())
    }

    async fn end(&self) -> Result<(), TransportError> {
        *self.ended.lock() = true;
        Ok(())
    }
}

/// A command received by a [`StaticHost`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentCommand {
    pub ieee_address: String,
    pub property: String,
    pub value: Value,
}

/// Host with a fixed device list and state.
#[derive(Default)]
pub struct StaticHost {
    devices: Mutex<Vec<ZigbeeDevice>>,
    groups: Mutex<Vec<ZigbeeGroup>>,
    states: Mutex<HashMap<String, DeviceStateMap>>,
    failing_snapshots: Mutex<Vec<String>>,
    commands: Mutex<Vec<SentCommand>>,
    resolve_calls: AtomicUsize,
}

impl StaticHost {
    pub fn new(devices: Vec<ZigbeeDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Default::default()
        }
    }

    pub fn with_group(self, group: ZigbeeGroup) -> Self {
        self.groups.lock().push(group);
        self
    }

    pub fn set_state(&self, ieee_address: &str, state: Value) {
        if let Value::Object(map) = state {
            self.states.lock().insert(ieee_address.to_string(), map);
        }
    }

    /// Make `snapshot` fail for the given device.
    pub fn fail_snapshot(&self, ieee_address: &str) {
        self.failing_snapshots.lock().push(ieee_address.to_string());
    }

    pub fn commands(&self) -> Vec<SentCommand> {
        self.commands.lock().clone()
    }

    /// Number of `resolve` calls so far.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceSource for StaticHost {
    async fn devices(&self) -> Result<Vec<ZigbeeDevice>, HostError> {
        Ok(self.devices.lock().clone())
    }

    async fn resolve(&self, id: &str) -> Option<Entity> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(device) = self
            .devices
            .lock()
            .iter()
            .find(|d| d.ieee_address == id || d.friendly_name.as_deref() == Some(id))
        {
            return Some(Entity::Device(device.clone()));
        }
        self.groups
            .lock()
            .iter()
            .find(|g| g.friendly_name == id || g.id.to_string() == id)
            .cloned()
            .map(Entity::Group)
    }
}

#[async_trait]
impl StateStore for StaticHost {
    async fn snapshot(&self, device: &ZigbeeDevice) -> Result<DeviceStateMap, HostError> {
        if self.failing_snapshots.lock().contains(&device.ieee_address) {
            return Err(HostError::Unavailable(format!(
                "no state for {}",
                device.ieee_address
            )));
        }
        Ok(self
            .states
            .lock()
            .get(&device.ieee_address)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CommandSink for StaticHost {
    async fn send_command(
        &self,
        device: &ZigbeeDevice,
        property: &str,
        value: Value,
    ) -> Result<(), HostError> {
        self.commands.lock().push(SentCommand {
            ieee_address: device.ieee_address.clone(),
            property: property.to_string(),
            value,
        });
        Ok(())
    }
}
