//! Core types for z2m-homie.
//!
//! This crate defines the foundational pieces shared by the workspace:
//! errors, host events, the event bus and configuration.

pub mod config;
pub mod error;
pub mod event;
pub mod eventbus;

pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use event::{BridgeEvent, EntityRef, EventMetadata};
pub use eventbus::{DEFAULT_CHANNEL_CAPACITY, EventBus, HandlerRegistration, SharedEventBus};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{BridgeConfig, defaults, env_vars};
    pub use crate::error::{Error, Result};
    pub use crate::event::{BridgeEvent, EntityRef, EventMetadata};
    pub use crate::eventbus::{EventBus, HandlerRegistration, SharedEventBus};
}
