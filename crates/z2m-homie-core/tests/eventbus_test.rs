//! Tests for the EventBus module.
//!
//! Tests include:
//! - Multiple owners
//! - Registration lifetime
//! - Event metadata
//! - Concurrent publishers

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use z2m_homie_core::{BridgeEvent, EntityRef, EventBus, SharedEventBus};

fn state_change(ieee: &str) -> BridgeEvent {
    let mut changed = serde_json::Map::new();
    changed.insert("state".to_string(), json!("ON"));
    BridgeEvent::state_changed(EntityRef::device(ieee), changed)
}

#[tokio::test]
async fn test_multiple_owners_receive_every_event() {
    let bus = EventBus::new();
    let mut first = bus.subscribe_as("bridge-a");
    let mut second = bus.subscribe_as("bridge-b");

    bus.publish(state_change("0x01"));

    let (a, _) = first.recv().await.unwrap();
    let (b, _) = second.recv().await.unwrap();
    assert_eq!(a.type_name(), "DeviceStateChanged");
    assert_eq!(b.type_name(), "DeviceStateChanged");
}

#[tokio::test]
async fn test_dropped_registration_stops_delivery() {
    let bus = EventBus::new();
    let registration = bus.subscribe_as("bridge");
    let mut other = bus.subscribe_as("logger");
    assert!(bus.is_registered("bridge"));

    drop(registration);
    assert!(!bus.is_registered("bridge"));
    assert!(bus.is_registered("logger"));

    assert!(bus.publish(state_change("0x01")));
    assert!(other.recv().await.is_some());
}

#[tokio::test]
async fn test_metadata_ids_are_unique() {
    let bus = EventBus::new();
    let mut registration = bus.subscribe_as("bridge");

    bus.publish(state_change("0x01"));
    bus.publish_with_source(BridgeEvent::mqtt_message("homie/5/x/y/z/set", "1"), "mqtt");

    let (_, first) = registration.recv().await.unwrap();
    let (event, second) = registration.recv().await.unwrap();
    assert_ne!(first.event_id, second.event_id);
    assert_eq!(second.source, "mqtt");
    assert!(event.is_message());
}

#[tokio::test]
async fn test_concurrent_publishers() {
    let bus: SharedEventBus = Arc::new(EventBus::new());
    let mut registration = bus.subscribe_as("bridge");

    let mut handles = Vec::new();
    for i in 0..10 {
        let bus = bus.clone();
        handles.push(tokio::spawn(async move {
            bus.publish(state_change(&format!("0x{:02x}", i)));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut received = 0;
    while let Ok(Some(_)) = timeout(Duration::from_millis(100), registration.recv()).await {
        received += 1;
        if received == 10 {
            break;
        }
    }
    assert_eq!(received, 10);
}

#[tokio::test]
async fn test_recv_returns_none_when_bus_dropped() {
    let bus = EventBus::new();
    let mut registration = bus.subscribe_as("bridge");
    drop(bus);

    assert!(registration.recv().await.is_none());
}
