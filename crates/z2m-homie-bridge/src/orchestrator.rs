//! Homie 5 bridge: announces Zigbee devices and keeps their values in sync.
//!
//! ```text
//! start():  bridge init -> per device (init, $description, values, ready)
//!           -> bridge $description (children) -> bridge ready -> subscribe
//! events:   state change -> republish changed values
//!           <prefix>/<version>/<device>/<node>/<property>/set -> command
//! stop():   bridge lost -> release handler registration
//! ```

use crate::host::{CommandSink, DeviceSource, DeviceStateMap, HostError, StateStore};
use crate::topic::{self, SetTopic, TopicRejection};
use crate::transport::{HomieTransport, PublishOptions, Qos, TransportError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use z2m_homie_core::{BridgeConfig, BridgeEvent, EntityRef, HandlerRegistration, SharedEventBus};
use z2m_homie_devices::{
    Description, DeviceState, Entity, Property, VersionSource, ZigbeeDevice, decode_command,
    device_leaves, encode_state, find_leaf, translate,
};

/// Bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Collaborators of a [`Homie5Bridge`].
#[derive(Clone)]
pub struct BridgeContext {
    pub config: BridgeConfig,
    pub transport: Arc<dyn HomieTransport>,
    pub devices: Arc<dyn DeviceSource>,
    pub states: Arc<dyn StateStore>,
    pub commands: Arc<dyn CommandSink>,
    pub bus: SharedEventBus,
    pub versions: Arc<dyn VersionSource>,
}

/// Why an inbound message was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    Topic(TopicRejection),
    UnknownEntity(String),
    Group(String),
    UnknownProperty { device: String, property: String },
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(rejection) => write!(f, "{}", rejection),
            Self::UnknownEntity(id) => write!(f, "unknown entity {}", id),
            Self::Group(id) => write!(f, "{} is a group", id),
            Self::UnknownProperty { device, property } => {
                write!(f, "device {} has no property {}", device, property)
            }
        }
    }
}

/// Result of handling an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Forwarded { device_id: String, property: String },
    Discarded(DiscardReason),
}

/// Homie 5 bridge for one Zigbee host.
///
/// Several bridges may share a transport and event bus; each registers on
/// the bus under its own owner id.
pub struct Homie5Bridge {
    ctx: BridgeContext,
    owner: String,
    registration: Option<HandlerRegistration>,
    /// Bridge state last published by this instance
    state: Option<DeviceState>,
    children: Vec<String>,
    descriptions: HashMap<String, Description>,
}

impl Homie5Bridge {
    pub fn new(ctx: BridgeContext) -> Self {
        let owner = format!("homie5-bridge-{}", uuid::Uuid::new_v4());
        Self {
            ctx,
            owner,
            registration: None,
            state: None,
            children: Vec::new(),
            descriptions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.ctx.config
    }

    /// Owner id used for the event bus registration.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn state(&self) -> Option<DeviceState> {
        self.state
    }

    /// Ids of the devices announced by the last `start`.
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// Last published description of a represented device.
    pub fn description(&self, device_id: &str) -> Option<&Description> {
        self.descriptions.get(device_id)
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Announce the bridge and every eligible device, then start listening
    /// for commands and state changes.
    ///
    /// A failure while announcing a single device is logged and reported on
    /// the bridge `$log` topic; that device stays in `init`. Failures on the
    /// bridge's own topics are returned.
    pub async fn start(&mut self) -> Result<()> {
        let bridge_id = self.ctx.config.bridge_id.clone();
        tracing::info!(bridge = %bridge_id, namespace = %self.ctx.config.namespace(), "Starting Homie bridge");

        self.publish_state(&bridge_id, DeviceState::Init).await?;
        self.state = Some(DeviceState::Init);
        self.children.clear();
        self.descriptions.clear();

        let devices = self.ctx.devices.devices().await?;
        for device in &devices {
            if !device.is_eligible() {
                tracing::debug!(
                    device = %device.ieee_address,
                    interviewing = device.interviewing,
                    "Skipping device without completed interview"
                );
                continue;
            }
            let device_id = self.ctx.config.device_id(&device.ieee_address);
            if let Err(e) = self.announce_device(&device_id, device).await {
                self.report_failure(&device_id, &e);
            }
        }

        let description = Description::new(
            self.ctx.config.bridge_name.clone(),
            self.ctx.versions.next_version(),
        )
        .with_children(self.children.clone());
        self.publish_retained(&bridge_id, "$description", description.to_payload()?)
            .await?;
        self.publish_state(&bridge_id, DeviceState::Ready).await?;
        self.state = Some(DeviceState::Ready);

        self.registration = Some(self.ctx.bus.subscribe_as(self.owner.clone()));
        self.ctx
            .transport
            .subscribe(&topic::set_filter(&self.ctx.config), Qos::ExactlyOnce)
            .await?;

        tracing::info!(devices = self.children.len(), "Homie bridge ready");
        Ok(())
    }

    /// Mark the bridge lost and stop handling events.
    ///
    /// `lost` is published on every call; releasing the registration and
    /// clearing the announced devices are no-ops after the first.
    pub async fn stop(&mut self) -> Result<()> {
        let bridge_id = self.ctx.config.bridge_id.clone();
        let result = self.publish_state(&bridge_id, DeviceState::Lost).await;

        self.state = None;
        drop(self.registration.take());
        self.children.clear();
        self.descriptions.clear();
        tracing::info!(bridge = %bridge_id, "Homie bridge stopped");
        result
    }

    /// Wait for the next event of this bridge's registration.
    ///
    /// Returns `None` when not started or once the bus is closed.
    pub async fn next_event(&mut self) -> Option<BridgeEvent> {
        let registration = self.registration.as_mut()?;
        registration.recv().await.map(|(event, _)| event)
    }

    pub async fn handle_event(&mut self, event: BridgeEvent) -> Result<()> {
        match event {
            BridgeEvent::MqttMessage { topic, payload, .. } => {
                let outcome = self.handle_message(&topic, &payload).await?;
                if let MessageOutcome::Discarded(reason) = outcome {
                    tracing::debug!(topic = %topic, reason = %reason, "Discarded message");
                }
                Ok(())
            }
            BridgeEvent::DeviceStateChanged {
                entity, changed, ..
            } => self.handle_state_change(&entity, &changed).await,
        }
    }

    /// Forward a Homie `set` command to the device.
    pub async fn handle_message(&self, topic: &str, payload: &str) -> Result<MessageOutcome> {
        let set = match SetTopic::parse(topic, &self.ctx.config) {
            Ok(set) => set,
            Err(rejection) => return Ok(MessageOutcome::Discarded(DiscardReason::Topic(rejection))),
        };

        let device = match self.ctx.devices.resolve(set.ieee_address).await {
            Some(Entity::Device(device)) => device,
            Some(Entity::Group(group)) => {
                return Ok(MessageOutcome::Discarded(DiscardReason::Group(
                    group.friendly_name,
                )));
            }
            None => {
                return Ok(MessageOutcome::Discarded(DiscardReason::UnknownEntity(
                    set.ieee_address.to_string(),
                )));
            }
        };

        let leaves = device_leaves(&device);
        let Some(leaf) = find_leaf(&leaves, set.property_id) else {
            return Ok(MessageOutcome::Discarded(DiscardReason::UnknownProperty {
                device: set.device_id.to_string(),
                property: set.property_id.to_string(),
            }));
        };

        let value = decode_command(payload, Some(leaf));
        tracing::debug!(device = %set.device_id, property = %set.property_id, value = %value, "Forwarding command");
        self.ctx
            .commands
            .send_command(&device, set.property_id, value)
            .await?;

        Ok(MessageOutcome::Forwarded {
            device_id: set.device_id.to_string(),
            property: set.property_id.to_string(),
        })
    }

    /// Publish the changed values of a represented device.
    pub async fn handle_state_change(
        &self,
        entity: &EntityRef,
        changed: &DeviceStateMap,
    ) -> Result<()> {
        let Some(ieee_address) = entity.ieee_address() else {
            return Ok(());
        };
        let device_id = self.ctx.config.device_id(ieee_address);
        let Some(description) = self.descriptions.get(&device_id) else {
            tracing::debug!(device = %device_id, "State change for unannounced device");
            return Ok(());
        };
        self.publish_values(&device_id, description, changed).await
    }

    async fn announce_device(&mut self, device_id: &str, device: &ZigbeeDevice) -> Result<()> {
        self.publish_state(device_id, DeviceState::Init).await?;

        let description = translate(device, self.ctx.versions.as_ref())
            .with_root(self.ctx.config.bridge_id.clone());
        self.publish_retained(device_id, "$description", description.to_payload()?)
            .await?;

        let values = self.ctx.states.snapshot(device).await?;
        self.publish_values(device_id, &description, &values).await?;

        self.publish_state(device_id, DeviceState::Ready).await?;

        tracing::info!(device = %device_id, name = %device.display_name(), "Announced device");
        self.children.push(device_id.to_string());
        self.descriptions.insert(device_id.to_string(), description);
        Ok(())
    }

    async fn publish_values(
        &self,
        device_id: &str,
        description: &Description,
        values: &DeviceStateMap,
    ) -> Result<()> {
        for (node_id, property_id, property) in description.properties() {
            let Some(payload) = values
                .get(property_id)
                .and_then(|value| encode_state(property, value))
            else {
                continue;
            };
            let path = format!("{}/{}", node_id, property_id);
            self.publish_value(device_id, &path, property, payload).await?;
        }
        Ok(())
    }

    async fn publish_value(
        &self,
        device_id: &str,
        path: &str,
        property: &Property,
        payload: String,
    ) -> Result<()> {
        let topic = topic::device_topic(&self.ctx.config, device_id, path);
        tracing::debug!(topic = %topic, payload = %payload, "Publishing value");
        if property.is_retained() {
            self.ctx
                .transport
                .publish(&topic, payload, PublishOptions::RETAINED)
                .await?;
        } else if let Err(e) = self
            .ctx
            .transport
            .try_publish(&topic, payload, PublishOptions::VOLATILE)
        {
            tracing::warn!(topic = %topic, error = %e, "Dropped non-retained value");
        }
        Ok(())
    }

    async fn publish_state(&self, device_id: &str, state: DeviceState) -> Result<()> {
        self.publish_retained(device_id, "$state", state.as_str().to_string())
            .await
    }

    async fn publish_retained(&self, device_id: &str, attribute: &str, payload: String) -> Result<()> {
        let topic = topic::device_topic(&self.ctx.config, device_id, attribute);
        self.ctx
            .transport
            .publish(&topic, payload, PublishOptions::RETAINED)
            .await?;
        Ok(())
    }

    fn report_failure(&self, device_id: &str, error: &BridgeError) {
        tracing::warn!(device = %device_id, error = %error, "Failed to announce device");
        let topic = topic::device_topic(&self.ctx.config, &self.ctx.config.bridge_id, "$log");
        let message = format!("Failed to announce {}: {}", device_id, error);
        if let Err(e) = self
            .ctx
            .transport
            .try_publish(&topic, message, PublishOptions::VOLATILE)
        {
            tracing::debug!(error = %e, "Could not publish to bridge log");
        }
    }
}
