//! Zigbee host backed by a Zigbee2MQTT instance on the same broker.
//!
//! Consumes:
//! - `<base>/bridge/devices`: device list (retained)
//! - `<base>/bridge/groups`: group list (retained)
//! - `<base>/<friendly_name>`: device or group state as a JSON object
//!
//! Commands are published to `<base>/<friendly_name>/set` as
//! `{"<property>": <value>}`.

use crate::host::{CommandSink, DeviceSource, DeviceStateMap, HostError, StateStore};
use crate::transport::{HomieTransport, PublishOptions};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use z2m_homie_core::{BridgeEvent, EntityRef, Result, SharedEventBus};
use z2m_homie_devices::{Entity, ZigbeeDevice, ZigbeeGroup, parse_devices, parse_groups};

/// What an inbound Zigbee2MQTT message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    Devices(usize),
    Groups(usize),
    State { entity: EntityRef, changed: usize },
    Ignored,
}

#[derive(Default)]
struct HostCache {
    devices: Vec<ZigbeeDevice>,
    groups: Vec<ZigbeeGroup>,
    states: HashMap<EntityRef, DeviceStateMap>,
}

impl HostCache {
    fn entity_by_name(&self, name: &str) -> Option<EntityRef> {
        if let Some(device) = self
            .devices
            .iter()
            .find(|d| d.friendly_name.as_deref() == Some(name) || d.ieee_address == name)
        {
            return Some(EntityRef::device(device.ieee_address.clone()));
        }
        self.groups
            .iter()
            .find(|g| g.friendly_name == name)
            .map(|g| EntityRef::group(g.id))
    }
}

/// Zigbee2MQTT host adapter.
pub struct Zigbee2MqttHost {
    base_topic: String,
    transport: Arc<dyn HomieTransport>,
    bus: SharedEventBus,
    cache: RwLock<HostCache>,
    devices_seen: watch::Sender<bool>,
}

impl Zigbee2MqttHost {
    pub fn new(
        base_topic: impl Into<String>,
        transport: Arc<dyn HomieTransport>,
        bus: SharedEventBus,
    ) -> Self {
        let (devices_seen, _) = watch::channel(false);
        Self {
            base_topic: base_topic.into(),
            transport,
            bus,
            cache: RwLock::new(HostCache::default()),
            devices_seen,
        }
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Subscription filter covering everything this host consumes.
    pub fn subscription(&self) -> String {
        format!("{}/#", self.base_topic)
    }

    /// Whether `topic` belongs to this Zigbee2MQTT instance.
    pub fn owns_topic(&self, topic: &str) -> bool {
        topic
            .strip_prefix(self.base_topic.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Wait until a device list has been received.
    ///
    /// Returns `false` on timeout.
    pub async fn wait_for_devices(&self, timeout: Duration) -> bool {
        let mut rx = self.devices_seen.subscribe();
        let seen = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|seen| *seen)).await,
            Ok(Ok(_))
        );
        seen
    }

    /// Apply an inbound Zigbee2MQTT message to the cache.
    ///
    /// State messages publish a [`BridgeEvent::DeviceStateChanged`] carrying
    /// only the keys whose value changed.
    pub fn ingest(&self, topic: &str, payload: &[u8]) -> Result<Ingested> {
        let Some(rest) = topic
            .strip_prefix(self.base_topic.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return Ok(Ingested::Ignored);
        };

        match rest {
            "bridge/devices" => {
                let devices = parse_devices(payload)?;
                let count = devices.len();
                self.cache.write().devices = devices;
                self.devices_seen.send_replace(true);
                tracing::info!(devices = count, "Received device list");
                Ok(Ingested::Devices(count))
            }
            "bridge/groups" => {
                let groups = parse_groups(payload)?;
                let count = groups.len();
                self.cache.write().groups = groups;
                tracing::debug!(groups = count, "Received group list");
                Ok(Ingested::Groups(count))
            }
            _ if rest.starts_with("bridge/") => Ok(Ingested::Ignored),
            name => self.ingest_state(name, payload),
        }
    }

    fn ingest_state(&self, name: &str, payload: &[u8]) -> Result<Ingested> {
        let Ok(Value::Object(update)) = serde_json::from_slice::<Value>(payload) else {
            return Ok(Ingested::Ignored);
        };

        let (entity, changed) = {
            let mut cache = self.cache.write();
            let Some(entity) = cache.entity_by_name(name) else {
                return Ok(Ingested::Ignored);
            };
            let state = cache.states.entry(entity.clone()).or_default();
            let mut changed = Map::new();
            for (key, value) in update {
                if state.get(&key) != Some(&value) {
                    state.insert(key.clone(), value.clone());
                    changed.insert(key, value);
                }
            }
            (entity, changed)
        };

        let count = changed.len();
        if count > 0 {
            self.bus
                .publish_with_source(BridgeEvent::state_changed(entity.clone(), changed), "zigbee2mqtt");
        }
        Ok(Ingested::State {
            entity,
            changed: count,
        })
    }
}

#[async_trait]
impl DeviceSource for Zigbee2MqttHost {
    async fn devices(&self) -> std::result::Result<Vec<ZigbeeDevice>, HostError> {
        if !*self.devices_seen.borrow() {
            return Err(HostError::Unavailable(format!(
                "nothing received on {}/bridge/devices",
                self.base_topic
            )));
        }
        Ok(self.cache.read().devices.clone())
    }

    async fn resolve(&self, id: &str) -> Option<Entity> {
        let cache = self.cache.read();
        if let Some(device) = cache
            .devices
            .iter()
            .find(|d| d.ieee_address == id || d.friendly_name.as_deref() == Some(id))
        {
            return Some(Entity::Device(device.clone()));
        }
        cache
            .groups
            .iter()
            .find(|g| g.friendly_name == id || g.id.to_string() == id)
            .cloned()
            .map(Entity::Group)
    }
}

#[async_trait]
impl StateStore for Zigbee2MqttHost {
    async fn snapshot(&self, device: &ZigbeeDevice) -> std::result::Result<DeviceStateMap, HostError> {
        Ok(self
            .cache
            .read()
            .states
            .get(&EntityRef::device(device.ieee_address.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CommandSink for Zigbee2MqttHost {
    async fn send_command(
        &self,
        device: &ZigbeeDevice,
        property: &str,
        value: Value,
    ) -> std::result::Result<(), HostError> {
        let topic = format!("{}/{}/set", self.base_topic, device.display_name());
        let mut command = Map::new();
        command.insert(property.to_string(), value);
        let payload = Value::Object(command).to_string();

        tracing::debug!(topic = %topic, payload = %payload, "Sending command");
        self.transport
            .publish(&topic, payload, PublishOptions::COMMAND)
            .await
            .map_err(|e| HostError::Command {
                device: device.ieee_address.clone(),
                message: e.to_string(),
            })
    }
}
