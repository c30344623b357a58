//! Homie 5 device description model.
//!
//! ```text
//! Description (device)
//! └─ nodes: node-id -> Node
//!    └─ properties: property-id -> Property (tagged by datatype)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Implemented Homie convention version, without patch level.
pub const HOMIE_VERSION: &str = "5.0";

/// Homie device lifecycle state, published on `$state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    /// Connected, but not all Homie messages have been sent yet
    Init,
    /// All messages sent, ready to operate
    Ready,
    /// Cleanly disconnected
    Disconnected,
    /// Sleeping
    Sleeping,
    /// Badly disconnected
    Lost,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Sleeping => "sleeping",
            Self::Lost => "lost",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    Boolean,
    Integer,
    Float,
    Enum,
    Color,
    Datetime,
    Duration,
    Json,
}

impl Datatype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Enum => "enum",
            Self::Color => "color",
            Self::Datetime => "datetime",
            Self::Duration => "duration",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes shared by all property datatypes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAttributes {
    /// Friendly name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Datatype-specific restrictions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default)]
    pub settable: bool,

    #[serde(default = "default_retained")]
    pub retained: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

fn default_retained() -> bool {
    true
}

impl PropertyAttributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            format: None,
            settable: false,
            retained: true,
            unit: None,
        }
    }
}

/// A Homie property, tagged by datatype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "datatype", rename_all = "lowercase")]
pub enum Property {
    String(PropertyAttributes),
    Boolean(PropertyAttributes),
    Integer(PropertyAttributes),
    Float(PropertyAttributes),
    Enum(PropertyAttributes),
    Color(PropertyAttributes),
    Datetime(PropertyAttributes),
    Duration(PropertyAttributes),
    Json(PropertyAttributes),
}

impl Property {
    /// Build a property of the given datatype.
    pub fn new(datatype: Datatype, attributes: PropertyAttributes) -> Self {
        match datatype {
            Datatype::String => Self::String(attributes),
            Datatype::Boolean => Self::Boolean(attributes),
            Datatype::Integer => Self::Integer(attributes),
            Datatype::Float => Self::Float(attributes),
            Datatype::Enum => Self::Enum(attributes),
            Datatype::Color => Self::Color(attributes),
            Datatype::Datetime => Self::Datetime(attributes),
            Datatype::Duration => Self::Duration(attributes),
            Datatype::Json => Self::Json(attributes),
        }
    }

    pub fn datatype(&self) -> Datatype {
        match self {
            Self::String(_) => Datatype::String,
            Self::Boolean(_) => Datatype::Boolean,
            Self::Integer(_) => Datatype::Integer,
            Self::Float(_) => Datatype::Float,
            Self::Enum(_) => Datatype::Enum,
            Self::Color(_) => Datatype::Color,
            Self::Datetime(_) => Datatype::Datetime,
            Self::Duration(_) => Datatype::Duration,
            Self::Json(_) => Datatype::Json,
        }
    }

    pub fn attributes(&self) -> &PropertyAttributes {
        match self {
            Self::String(a)
            | Self::Boolean(a)
            | Self::Integer(a)
            | Self::Float(a)
            | Self::Enum(a)
            | Self::Color(a)
            | Self::Datetime(a)
            | Self::Duration(a)
            | Self::Json(a) => a,
        }
    }

    pub fn is_settable(&self) -> bool {
        self.attributes().settable
    }

    pub fn is_retained(&self) -> bool {
        self.attributes().retained
    }

    pub fn format(&self) -> Option<&str> {
        self.attributes().format.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.attributes().unit.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes().name.as_deref()
    }
}

/// A Homie node: a named group of properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            properties: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Homie device description document, published on `$description`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub homie: String,

    /// Document version; changes whenever the document changes
    pub version: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, Node>,

    /// Child device ids; present on the root even when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,

    /// Root device id (omitted on the root itself)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Description {
    pub fn new(name: impl Into<String>, version: i64) -> Self {
        Self {
            homie: HOMIE_VERSION.to_string(),
            version,
            name: Some(name.into()),
            nodes: BTreeMap::new(),
            children: None,
            root: None,
            parent: None,
        }
    }

    /// Attach this device below `root`, which is also its direct parent.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        self.parent = Some(root.clone());
        self.root = Some(root);
        self
    }

    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.children = Some(children);
        self
    }

    /// Iterate over every `(node id, property id, property)`.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str, &Property)> {
        self.nodes.iter().flat_map(|(node_id, node)| {
            node.properties
                .iter()
                .map(move |(prop_id, prop)| (node_id.as_str(), prop_id.as_str(), prop))
        })
    }

    /// Find the first node holding a property with the given id.
    pub fn find_property(&self, property_id: &str) -> Option<(&str, &Property)> {
        self.nodes.iter().find_map(|(node_id, node)| {
            node.properties
                .get(property_id)
                .map(|prop| (node_id.as_str(), prop))
        })
    }

    /// Serialize to the `$description` payload.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
