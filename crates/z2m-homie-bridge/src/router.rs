//! Routes inbound MQTT messages to the host cache or the bridge.

use crate::transport::InboundHandler;
use crate::z2m::Zigbee2MqttHost;
use std::sync::Arc;
use z2m_homie_core::{BridgeConfig, BridgeEvent, SharedEventBus};

/// Inbound message router.
///
/// Zigbee2MQTT topics update the host cache; Homie topics are forwarded to
/// the event bus as [`BridgeEvent::MqttMessage`].
pub struct MessageRouter {
    homie_prefix: String,
    host: Arc<Zigbee2MqttHost>,
    bus: SharedEventBus,
}

impl MessageRouter {
    pub fn new(config: &BridgeConfig, host: Arc<Zigbee2MqttHost>, bus: SharedEventBus) -> Self {
        Self {
            homie_prefix: format!("{}/", config.homie_prefix),
            host,
            bus,
        }
    }
}

impl InboundHandler for MessageRouter {
    fn handle(&self, topic: &str, payload: &[u8]) {
        if self.host.owns_topic(topic) {
            match self.host.ingest(topic, payload) {
                Ok(outcome) => tracing::trace!(topic, ?outcome, "Ingested"),
                Err(e) => tracing::warn!(topic, error = %e, "Failed to ingest Zigbee2MQTT message"),
            }
        } else if topic.starts_with(&self.homie_prefix) {
            let payload = String::from_utf8_lossy(payload).into_owned();
            if !self.bus.publish_with_source(BridgeEvent::mqtt_message(topic, payload), "mqtt") {
                tracing::debug!(topic, "No handler registered for message");
            }
        } else {
            tracing::trace!(topic, "Unrouted message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use z2m_homie_core::EventBus;

    #[tokio::test]
    async fn test_routing() {
        let bus = Arc::new(EventBus::new());
        let host = Arc::new(Zigbee2MqttHost::new(
            "zigbee2mqtt",
            Arc::new(MemoryTransport::new()),
            bus.clone(),
        ));
        let router = MessageRouter::new(&BridgeConfig::default(), host.clone(), bus.clone());
        let mut registration = bus.subscribe_as("test");

        router.handle("homie/5/z2m-0x01/primary/state/set", b"true");
        let (event, meta) = registration.try_recv().unwrap();
        assert!(event.is_message());
        assert_eq!(meta.source, "mqtt");

        router.handle("zigbee2mqtt/bridge/devices", b"[]");
        assert!(registration.try_recv().is_none());
        assert!(host.wait_for_devices(std::time::Duration::from_millis(10)).await);

        router.handle("elsewhere/topic", b"x");
        assert!(registration.try_recv().is_none());
    }
}
