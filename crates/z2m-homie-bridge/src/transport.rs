//! Publish/subscribe transport used by the bridge.
//!
//! Topics passed to a transport are absolute MQTT topics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MQTT QoS level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl Default for Qos {
    fn default() -> Self {
        Self::AtLeastOnce
    }
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Delivery options of a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    pub qos: Qos,
    pub retain: bool,
}

impl PublishOptions {
    /// Highest QoS, retained. Used for `$state`, `$description` and
    /// retained property values.
    pub const RETAINED: Self = Self {
        qos: Qos::ExactlyOnce,
        retain: true,
    };

    /// Fire-and-forget, not retained.
    pub const VOLATILE: Self = Self {
        qos: Qos::AtMostOnce,
        retain: false,
    };

    /// Device commands towards the driver.
    pub const COMMAND: Self = Self {
        qos: Qos::AtLeastOnce,
        retain: false,
    };
}

/// Transport errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Publish to {topic} failed: {message}")]
    Publish { topic: String, message: String },

    #[error("Subscribe to {topic} failed: {message}")]
    Subscribe { topic: String, message: String },

    #[error("Disconnect failed: {0}")]
    Disconnect(String),
}

impl TransportError {
    pub fn publish(topic: impl Into<String>, message: impl ToString) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.to_string(),
        }
    }

    pub fn subscribe(topic: impl Into<String>, message: impl ToString) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            message: message.to_string(),
        }
    }
}

/// Client-side primitives of a publish/subscribe transport.
#[async_trait]
pub trait HomieTransport: Send + Sync {
    /// Publish and wait until the message is handed to the client.
    async fn publish(
        &self,
        topic: &str,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), TransportError>;

    /// Queue a publish without waiting.
    fn try_publish(
        &self,
        topic: &str,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), TransportError>;

    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), TransportError>;

    /// Disconnect cleanly.
    async fn end(&self) -> Result<(), TransportError>;
}

/// Receiver of inbound transport messages.
pub trait InboundHandler: Send + Sync {
    fn handle(&self, topic: &str, payload: &[u8]);
}
