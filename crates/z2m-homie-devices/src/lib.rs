//! Zigbee and Homie 5 models for z2m-homie.
//!
//! - [`zigbee`]: device list and expose tree as published by Zigbee2MQTT
//! - [`homie`]: Homie 5 description documents
//! - [`translator`]: expose tree to description
//! - [`value`]: state values to property payloads and back

pub mod homie;
pub mod translator;
pub mod value;
pub mod zigbee;

pub use homie::{Datatype, Description, DeviceState, HOMIE_VERSION, Node, Property, PropertyAttributes};
pub use translator::{
    Bucket, FixedVersion, Leaf, LeafKind, SystemClock, VersionSource, device_leaves, find_leaf,
    flatten, leaf_to_property, translate,
};
pub use value::{decode_command, encode_state};
pub use zigbee::{
    Access, DeviceDefinition, Entity, Expose, ExposeKind, GroupMember, ZigbeeDevice, ZigbeeGroup,
    parse_devices, parse_groups,
};
