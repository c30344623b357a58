//! Zigbee device model as exposed by the Zigbee2MQTT driver layer.
//!
//! These types deserialize directly from the `bridge/devices` and
//! `bridge/groups` documents. They are read-only input to the translator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use z2m_homie_core::{Error, Result};

/// Access bitmask of an expose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Access(pub u8);

impl Access {
    /// The value is reported in the device state.
    pub const STATE: u8 = 0b001;
    /// The value can be set.
    pub const SET: u8 = 0b010;
    /// The value can be read on request.
    pub const GET: u8 = 0b100;

    pub const ALL: Access = Access(Self::STATE | Self::SET | Self::GET);
    pub const NONE: Access = Access(0);

    pub fn is_state(self) -> bool {
        self.0 & Self::STATE != 0
    }

    pub fn is_settable(self) -> bool {
        self.0 & Self::SET != 0
    }

    pub fn is_gettable(self) -> bool {
        self.0 & Self::GET != 0
    }
}

/// Declared type of an expose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExposeKind {
    Text,
    Binary,
    Switch,
    Numeric,
    Enum,
    List,
    Light,
    Lock,
    Climate,
    Fan,
    Cover,
    Composite,
    /// Any type this crate does not know about.
    Other(String),
}

impl ExposeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Switch => "switch",
            Self::Numeric => "numeric",
            Self::Enum => "enum",
            Self::List => "list",
            Self::Light => "light",
            Self::Lock => "lock",
            Self::Climate => "climate",
            Self::Fan => "fan",
            Self::Cover => "cover",
            Self::Composite => "composite",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for ExposeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => Self::Text,
            "binary" => Self::Binary,
            "switch" => Self::Switch,
            "numeric" => Self::Numeric,
            "enum" => Self::Enum,
            "list" => Self::List,
            "light" => Self::Light,
            "lock" => Self::Lock,
            "climate" => Self::Climate,
            "fan" => Self::Fan,
            "cover" => Self::Cover,
            "composite" => Self::Composite,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ExposeKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ExposeKind> for String {
    fn from(kind: ExposeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ExposeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability descriptor ("expose"), possibly with nested features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expose {
    #[serde(rename = "type")]
    pub kind: ExposeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Key of this value in the device state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub access: Access,

    /// `config` or `diagnostic`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_on: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_off: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_toggle: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_step: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<Expose>,
}

impl Expose {
    /// Create a bare expose of the given kind.
    pub fn new(kind: impl Into<ExposeKind>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: kind.into(),
            property: Some(name.clone()),
            name: Some(name),
            label: None,
            description: None,
            access: Access::ALL,
            category: None,
            endpoint: None,
            unit: None,
            value_on: None,
            value_off: None,
            value_toggle: None,
            value_min: None,
            value_max: None,
            value_step: None,
            values: Vec::new(),
            features: Vec::new(),
        }
    }

    /// Create a text expose.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(ExposeKind::Text, name)
    }

    /// Create a binary expose with its on/off values.
    pub fn binary(name: impl Into<String>, value_on: Value, value_off: Value) -> Self {
        let mut expose = Self::new(ExposeKind::Binary, name);
        expose.value_on = Some(value_on);
        expose.value_off = Some(value_off);
        expose
    }

    /// Create a numeric expose.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(ExposeKind::Numeric, name)
    }

    /// Create an enum expose.
    pub fn enumeration(name: impl Into<String>, values: Vec<Value>) -> Self {
        let mut expose = Self::new(ExposeKind::Enum, name);
        expose.values = values;
        expose
    }

    /// Create a composite expose (light, switch, composite, ...).
    pub fn composite(kind: impl Into<ExposeKind>, features: Vec<Expose>) -> Self {
        let kind = kind.into();
        let mut expose = Self::new(kind.clone(), kind.as_str());
        expose.property = None;
        expose.access = Access::NONE;
        expose.features = features;
        expose
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_access(mut self, access: u8) -> Self {
        self.access = Access(access);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>, step: Option<f64>) -> Self {
        self.value_min = min;
        self.value_max = max;
        self.value_step = step;
        self
    }

    /// Whether this expose groups child features instead of carrying a value.
    pub fn is_composite(&self) -> bool {
        !self.features.is_empty()
    }

    /// Stable identifier: the state key, falling back to the name and type.
    pub fn id(&self) -> &str {
        self.property
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_else(|| self.kind.as_str())
    }

    /// Human-readable label of this expose alone.
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .or(self.name.as_deref())
            .or(self.property.as_deref())
            .unwrap_or_else(|| self.kind.as_str())
    }
}

/// Device definition resolved by the driver for a supported model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub exposes: Vec<Expose>,

    /// Device-level configuration options
    #[serde(default)]
    pub options: Vec<Expose>,
}

fn default_supported() -> bool {
    true
}

/// A Zigbee device known to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZigbeeDevice {
    pub ieee_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Coordinator, Router or EndDevice
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,

    #[serde(default)]
    pub interview_completed: bool,

    #[serde(default)]
    pub interviewing: bool,

    #[serde(default = "default_supported")]
    pub supported: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<DeviceDefinition>,
}

impl ZigbeeDevice {
    /// Create an interviewed device with an empty definition.
    pub fn new(ieee_address: impl Into<String>) -> Self {
        Self {
            ieee_address: ieee_address.into(),
            friendly_name: None,
            device_type: Some("EndDevice".to_string()),
            interview_completed: true,
            interviewing: false,
            supported: true,
            definition: Some(DeviceDefinition::default()),
        }
    }

    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    pub fn with_exposes(mut self, exposes: Vec<Expose>) -> Self {
        self.definition.get_or_insert_with(Default::default).exposes = exposes;
        self
    }

    pub fn with_options(mut self, options: Vec<Expose>) -> Self {
        self.definition.get_or_insert_with(Default::default).options = options;
        self
    }

    /// Mark the device as currently being interviewed.
    pub fn interviewing(mut self) -> Self {
        self.interviewing = true;
        self.interview_completed = false;
        self
    }

    pub fn without_definition(mut self) -> Self {
        self.definition = None;
        self
    }

    /// Friendly name, falling back to the IEEE address.
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.ieee_address)
    }

    /// Whether the device is fully interviewed and has a definition.
    pub fn is_eligible(&self) -> bool {
        self.definition.is_some() && self.interview_completed && !self.interviewing
    }

    pub fn exposes(&self) -> &[Expose] {
        self.definition
            .as_ref()
            .map(|d| d.exposes.as_slice())
            .unwrap_or(&[])
    }

    pub fn options(&self) -> &[Expose] {
        self.definition
            .as_ref()
            .map(|d| d.options.as_slice())
            .unwrap_or(&[])
    }
}

/// Parse a `bridge/devices` document.
pub fn parse_devices(payload: &[u8]) -> Result<Vec<ZigbeeDevice>> {
    serde_json::from_slice(payload).map_err(|e| Error::parse("bridge/devices", e.to_string()))
}

/// Parse a `bridge/groups` document.
pub fn parse_groups(payload: &[u8]) -> Result<Vec<ZigbeeGroup>> {
    serde_json::from_slice(payload).map_err(|e| Error::parse("bridge/groups", e.to_string()))
}

/// Member of a Zigbee group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub ieee_address: String,
    #[serde(default)]
    pub endpoint: Option<u8>,
}

/// A Zigbee group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZigbeeGroup {
    pub id: u16,
    pub friendly_name: String,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

/// An entity resolved by the driver: a single device or a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Device(ZigbeeDevice),
    Group(ZigbeeGroup),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_bits() {
        assert!(Access(0b011).is_state());
        assert!(Access(0b011).is_settable());
        assert!(!Access(0b011).is_gettable());
        assert!(!Access(0b010).is_state());
        assert!(!Access::NONE.is_settable());
    }

    #[test]
    fn test_expose_kind_roundtrip_unknown() {
        let kind: ExposeKind = serde_json::from_value(json!("gradient")).unwrap();
        assert_eq!(kind, ExposeKind::Other("gradient".to_string()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("gradient"));
    }

    #[test]
    fn test_deserialize_z2m_device() {
        let device: ZigbeeDevice = serde_json::from_value(json!({
            "ieee_address": "0x00158d0001a2b3c4",
            "friendly_name": "living_room_lamp",
            "type": "Router",
            "interview_completed": true,
            "interviewing": false,
            "supported": true,
            "definition": {
                "model": "LED1545G12",
                "vendor": "IKEA",
                "description": "TRADFRI bulb",
                "exposes": [
                    {
                        "type": "light",
                        "features": [
                            {"type": "binary", "name": "state", "property": "state",
                             "access": 7, "value_on": "ON", "value_off": "OFF", "value_toggle": "TOGGLE"},
                            {"type": "numeric", "name": "brightness", "property": "brightness",
                             "access": 7, "value_min": 0, "value_max": 254}
                        ]
                    },
                    {"type": "numeric", "name": "linkquality", "property": "linkquality",
                     "access": 1, "unit": "lqi", "category": "diagnostic"}
                ],
                "options": [
                    {"type": "numeric", "name": "transition", "property": "transition",
                     "access": 2, "value_min": 0}
                ]
            }
        }))
        .unwrap();

        assert!(device.is_eligible());
        assert_eq!(device.display_name(), "living_room_lamp");
        assert_eq!(device.exposes().len(), 2);
        assert!(device.exposes()[0].is_composite());
        assert_eq!(device.exposes()[0].kind, ExposeKind::Light);
        assert_eq!(device.exposes()[1].category.as_deref(), Some("diagnostic"));
        assert_eq!(device.options().len(), 1);
    }

    #[test]
    fn test_coordinator_is_not_eligible() {
        let device: ZigbeeDevice = serde_json::from_value(json!({
            "ieee_address": "0x0000000000000000",
            "type": "Coordinator",
            "interview_completed": true
        }))
        .unwrap();
        assert!(!device.is_eligible());
        assert!(device.exposes().is_empty());
        assert_eq!(device.display_name(), "0x0000000000000000");
    }

    #[test]
    fn test_parse_device_and_group_lists() {
        let devices = parse_devices(br#"[{"ieee_address": "0x01", "interview_completed": true,
            "definition": {"exposes": []}}]"#)
        .unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_eligible());

        let groups =
            parse_groups(br#"[{"id": 3, "friendly_name": "kitchen", "members": [{"ieee_address": "0x01", "endpoint": 1}]}]"#)
                .unwrap();
        assert_eq!(groups[0].id, 3);
        assert_eq!(groups[0].members[0].endpoint, Some(1));

        let err = parse_devices(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_interviewing_is_not_eligible() {
        let device = ZigbeeDevice::new("0x01").interviewing();
        assert!(!device.is_eligible());
    }

    #[test]
    fn test_expose_id_and_label() {
        let expose = Expose::numeric("color_temp").with_label("Color temperature");
        assert_eq!(expose.id(), "color_temp");
        assert_eq!(expose.display_label(), "Color temperature");

        let composite = Expose::composite("light", vec![Expose::text("effect")]);
        assert_eq!(composite.id(), "light");
        assert_eq!(composite.display_label(), "light");
    }
}
