//! MQTT transport using rumqttc.

use crate::transport::{HomieTransport, InboundHandler, PublishOptions, Qos, TransportError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use z2m_homie_core::config::env_vars;

/// MQTT connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address.
    #[serde(default = "default_broker")]
    pub broker: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client ID. A random one is generated when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,

    #[serde(default = "default_clean_session")]
    pub clean_session: bool,

    /// Capacity of the client request queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delay before polling again after a connection error, in milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
}

fn default_broker() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_clean_session() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    100
}

fn default_reconnect_interval() -> u64 {
    5000
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self::new(default_broker())
    }
}

impl MqttConfig {
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
            clean_session: default_clean_session(),
            queue_capacity: default_queue_capacity(),
            reconnect_interval_ms: default_reconnect_interval(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Apply overrides from environment variables.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(broker) = env_vars::get(env_vars::MQTT_BROKER) {
            self.broker = broker;
        }
        if let Some(port) = env_vars::parse(env_vars::MQTT_PORT) {
            self.port = port;
        }
        if let Some(username) = env_vars::get(env_vars::MQTT_USERNAME) {
            self.username = Some(username);
        }
        if let Some(password) = env_vars::get(env_vars::MQTT_PASSWORD) {
            self.password = Some(password);
        }
        self
    }

    /// Get the full broker address.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker, self.port)
    }

    fn options(&self, will: Option<Will>) -> MqttOptions {
        let client_id = self
            .client_id
            .clone()
            .unwrap_or_else(|| format!("z2m-homie-{}", uuid::Uuid::new_v4()));

        let mut opts = MqttOptions::new(client_id, &self.broker, self.port);
        opts.set_keep_alive(Duration::from_secs(self.keep_alive));
        opts.set_clean_session(self.clean_session);

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            opts.set_credentials(username, password);
        }
        if let Some(will) = will {
            opts.set_last_will(LastWill::new(
                will.topic,
                will.payload,
                will.qos.into(),
                will.retain,
            ));
        }
        opts
    }
}

/// Last-will message the broker publishes when the connection is lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: String,
    pub qos: Qos,
    pub retain: bool,
}

impl Will {
    /// Retained, highest-QoS last will.
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: Qos::ExactlyOnce,
            retain: true,
        }
    }
}

/// rumqttc-backed transport.
pub struct MqttTransport {
    client: AsyncClient,
    broker: String,
}

/// Connection event loop, driven on its own task once spawned.
pub struct MqttEventLoop {
    event_loop: EventLoop,
    reconnect_interval: Duration,
}

impl MqttTransport {
    /// Create the client. No network traffic happens until the returned
    /// event loop is spawned.
    pub fn new(config: &MqttConfig, will: Option<Will>) -> (Self, MqttEventLoop) {
        let (client, event_loop) =
            AsyncClient::new(config.options(will), config.queue_capacity.max(1));
        (
            Self {
                client,
                broker: config.broker_addr(),
            },
            MqttEventLoop {
                event_loop,
                reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
            },
        )
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }
}

impl MqttEventLoop {
    /// Spawn the event loop, handing every inbound publish to `handler`.
    ///
    /// The task ends after a clean disconnect.
    pub fn spawn(mut self, handler: Arc<dyn InboundHandler>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        handler.handle(&p.topic, &p.payload);
                    }
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        tracing::info!(code = ?ack.code, "Connected to MQTT broker");
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        tracing::info!("Disconnected from MQTT broker");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "MQTT connection error");
                        tokio::time::sleep(self.reconnect_interval).await;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl HomieTransport for MqttTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), TransportError> {
        self.client
            .publish(topic, options.qos.into(), options.retain, payload)
            .await
            .map_err(|e| TransportError::publish(topic, e))
    }

    fn try_publish(
        &self,
        topic: &str,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, options.qos.into(), options.retain, payload)
            .map_err(|e| TransportError::publish(topic, e))
    }

    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), TransportError> {
        tracing::debug!(topic, "Subscribing");
        self.client
            .subscribe(topic, qos.into())
            .await
            .map_err(|e| TransportError::subscribe(topic, e))
    }

    async fn end(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_config() {
        let config = MqttConfig::new("broker.local")
            .with_port(1884)
            .with_auth("user", "pass")
            .with_client_id("bridge");

        assert_eq!(config.broker_addr(), "broker.local:1884");
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.client_id.as_deref(), Some("bridge"));
    }

    #[test]
    fn test_mqtt_config_partial_deserialize() {
        let config: MqttConfig = serde_json::from_str(r#"{"broker": "10.0.0.2"}"#).unwrap();
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive, 60);
        assert!(config.clean_session);
        assert_eq!(MqttConfig::default().broker, "localhost");
    }

    #[test]
    fn test_will_is_retained() {
        let will = Will::retained("homie/5/bridge/$state", "lost");
        assert!(will.retain);
        assert_eq!(will.qos, Qos::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_client_queues_without_connection() {
        let (transport, _event_loop) = MqttTransport::new(&MqttConfig::default(), None);
        assert_eq!(transport.broker(), "localhost:1883");
        assert!(
            transport
                .try_publish("homie/5/x/$state", "init".to_string(), PublishOptions::VOLATILE)
                .is_ok()
        );
    }
}
