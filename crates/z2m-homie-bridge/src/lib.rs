//! Homie 5 bridge for Zigbee2MQTT.
//!
//! [`Homie5Bridge`] announces the devices of a Zigbee host under the Homie 5
//! convention and keeps their values in sync. Its collaborators are traits
//! ([`HomieTransport`], [`DeviceSource`], [`StateStore`], [`CommandSink`]);
//! [`MqttTransport`] and [`Zigbee2MqttHost`] implement them over MQTT, the
//! [`memory`] module in process.

pub mod host;
pub mod memory;
pub mod mqtt;
pub mod orchestrator;
pub mod router;
pub mod topic;
pub mod transport;
pub mod z2m;

pub use host::{CommandSink, DeviceSource, DeviceStateMap, HostError, StateStore};
pub use mqtt::{MqttConfig, MqttEventLoop, MqttTransport, Will};
pub use orchestrator::{BridgeContext, BridgeError, DiscardReason, Homie5Bridge, MessageOutcome};
pub use router::MessageRouter;
pub use topic::{SetTopic, TopicRejection};
pub use transport::{HomieTransport, InboundHandler, PublishOptions, Qos, TransportError};
pub use z2m::{Ingested, Zigbee2MqttHost};
