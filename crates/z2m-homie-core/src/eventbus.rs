//! Event bus connecting the Zigbee host to its consumers.
//!
//! Consumers register under an owner id and receive a [`HandlerRegistration`]
//! token. Events are delivered to every live registration; dropping (or
//! explicitly releasing) the token removes the owner's handlers.

use crate::event::{BridgeEvent, EventMetadata};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Event bus for z2m-homie.
///
/// Uses a broadcast channel to distribute events to all registrations.
#[derive(Clone)]
pub struct EventBus {
    /// Broadcast channel sender
    tx: broadcast::Sender<(BridgeEvent, EventMetadata)>,
    /// Live registrations per owner
    owners: Arc<Mutex<HashMap<String, usize>>>,
    /// Event bus name for identification
    name: String,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the specified capacity.
    ///
    /// The capacity determines how many events are buffered for slow subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            owners: Arc::new(Mutex::new(HashMap::new())),
            name: "default".to_string(),
        }
    }

    /// Create a new event bus with a name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new()
        }
    }

    /// Get the name of this event bus.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Whether the owner currently holds at least one registration.
    pub fn is_registered(&self, owner: &str) -> bool {
        self.owners.lock().get(owner).copied().unwrap_or(0) > 0
    }

    /// Publish an event with default metadata.
    ///
    /// Returns `true` if there was at least one registration to deliver to.
    pub fn publish(&self, event: BridgeEvent) -> bool {
        self.publish_with_source(event, "host")
    }

    /// Publish an event with a custom source.
    pub fn publish_with_source(&self, event: BridgeEvent, source: impl Into<String>) -> bool {
        self.tx.send((event, EventMetadata::new(source))).is_ok()
    }

    /// Register handlers for `owner`.
    ///
    /// The returned token receives every event published after this call.
    pub fn subscribe_as(&self, owner: impl Into<String>) -> HandlerRegistration {
        let owner = owner.into();
        *self.owners.lock().entry(owner.clone()).or_insert(0) += 1;
        HandlerRegistration {
            owner,
            rx: self.tx.subscribe(),
            owners: Arc::clone(&self.owners),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler registration token.
///
/// Holding the token keeps the owner's handlers registered; dropping it
/// deregisters them.
pub struct HandlerRegistration {
    owner: String,
    rx: broadcast::Receiver<(BridgeEvent, EventMetadata)>,
    owners: Arc<Mutex<HashMap<String, usize>>>,
}

impl HandlerRegistration {
    /// Owner this registration belongs to.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Receive the next event.
    ///
    /// Returns `None` if the event bus is closed.
    pub async fn recv(&mut self) -> Option<(BridgeEvent, EventMetadata)> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(owner = %self.owner, skipped, "Event handler lagged behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<(BridgeEvent, EventMetadata)> {
        self.rx.try_recv().ok()
    }
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        let mut owners = self.owners.lock();
        if let Some(count) = owners.get_mut(&self.owner) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                owners.remove(&self.owner);
            }
        }
    }
}

/// Shared event bus handle.
pub type SharedEventBus = Arc<EventBus>;
