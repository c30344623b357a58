//! Capability translator: Zigbee exposes to a Homie 5 description.
//!
//! The expose tree is flattened into leaves, every leaf is classified into
//! one of three fixed nodes, and each leaf becomes exactly one property.
//! Translation is pure; the only input outside the device is the version
//! stamp, which is taken once per call from a [`VersionSource`].

use crate::homie::{Datatype, Description, Node, Property, PropertyAttributes};
use crate::zigbee::{Access, Expose, ExposeKind, ZigbeeDevice};
use serde_json::Value;

/// Node holding regular state and control properties.
pub const PRIMARY_NODE: &str = "primary";
/// Node holding configuration properties and device options.
pub const CONFIG_NODE: &str = "config";
/// Node holding diagnostic properties.
pub const DIAGNOSTIC_NODE: &str = "diagnostic";

const CONFIG_CATEGORY: &str = "config";
const DIAGNOSTIC_CATEGORY: &str = "diagnostic";

/// Supplies the `version` stamp of a description.
pub trait VersionSource: Send + Sync {
    fn next_version(&self) -> i64;
}

/// Wall-clock version: epoch milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl VersionSource for SystemClock {
    fn next_version(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Constant version, for reproducible output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedVersion(pub i64);

impl VersionSource for FixedVersion {
    fn next_version(&self) -> i64 {
        self.0
    }
}

/// Node a leaf is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Primary,
    Config,
    Diagnostic,
}

impl Bucket {
    /// Classify by category tag. Unknown tags land in the primary node.
    pub fn from_category(category: Option<&str>) -> Self {
        match category {
            Some(CONFIG_CATEGORY) => Self::Config,
            Some(DIAGNOSTIC_CATEGORY) => Self::Diagnostic,
            _ => Self::Primary,
        }
    }

    pub fn node_id(&self) -> &'static str {
        match self {
            Self::Primary => PRIMARY_NODE,
            Self::Config => CONFIG_NODE,
            Self::Diagnostic => DIAGNOSTIC_NODE,
        }
    }

    pub fn node_name(&self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::Config => "Configuration",
            Self::Diagnostic => "Diagnostics",
        }
    }

    /// Config and diagnostic nodes hold classification leaves.
    pub fn is_classification(&self) -> bool {
        !matches!(self, Self::Primary)
    }
}

/// Value semantics of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafKind {
    Text,
    Binary {
        value_on: Option<Value>,
        value_off: Option<Value>,
    },
    Numeric {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    Enum {
        values: Vec<String>,
    },
    List,
    /// A leaf whose type has no dedicated mapping.
    Unknown(String),
}

impl LeafKind {
    fn from_expose(expose: &Expose) -> Self {
        match &expose.kind {
            ExposeKind::Text => Self::Text,
            // A switch without features carries its own on/off value
            ExposeKind::Binary | ExposeKind::Switch => Self::Binary {
                value_on: expose.value_on.clone(),
                value_off: expose.value_off.clone(),
            },
            ExposeKind::Numeric => Self::Numeric {
                min: expose.value_min,
                max: expose.value_max,
                step: expose.value_step,
            },
            ExposeKind::Enum => Self::Enum {
                values: expose.values.iter().map(value_to_string).collect(),
            },
            ExposeKind::List => Self::List,
            other => Self::Unknown(other.as_str().to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// A single value-carrying capability after flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// Property id (state key)
    pub id: String,
    /// Display label including composite prefixes
    pub label: String,
    pub access: Access,
    pub bucket: Bucket,
    pub unit: Option<String>,
    pub kind: LeafKind,
}

impl Leaf {
    /// On/off values of a binary leaf.
    pub fn binary_values(&self) -> Option<(&Value, &Value)> {
        match &self.kind {
            LeafKind::Binary {
                value_on: Some(on),
                value_off: Some(off),
            } => Some((on, off)),
            _ => None,
        }
    }
}

/// Flatten an expose tree into its leaves, in tree order.
///
/// Composites contribute no leaf of their own; their label (followed by
/// `": "`) prefixes every descendant label, and their category is inherited
/// by descendants that carry none.
pub fn flatten(exposes: &[Expose], prefix: &str) -> Vec<Leaf> {
    let mut leaves = Vec::new();
    flatten_into(exposes, prefix, None, &mut leaves);
    leaves
}

fn flatten_into(exposes: &[Expose], prefix: &str, category: Option<&str>, out: &mut Vec<Leaf>) {
    for expose in exposes {
        let category = expose.category.as_deref().or(category);
        if expose.is_composite() {
            let nested = format!("{}{}: ", prefix, expose.display_label());
            flatten_into(&expose.features, &nested, category, out);
            continue;
        }
        out.push(Leaf {
            id: expose.id().to_string(),
            label: format!("{}{}", prefix, expose.display_label()),
            access: expose.access,
            bucket: Bucket::from_category(category),
            unit: expose.unit.clone(),
            kind: LeafKind::from_expose(expose),
        });
    }
}

/// All leaves of a device: its exposes followed by its options.
///
/// Options are always configuration, whatever their own category says.
pub fn device_leaves(device: &ZigbeeDevice) -> Vec<Leaf> {
    let mut leaves = flatten(device.exposes(), "");
    leaves.extend(flatten(device.options(), "").into_iter().map(|mut leaf| {
        leaf.bucket = Bucket::Config;
        leaf
    }));
    leaves
}

/// Find the leaf a property id refers to.
pub fn find_leaf<'a>(leaves: &'a [Leaf], property_id: &str) -> Option<&'a Leaf> {
    leaves.iter().find(|leaf| leaf.id == property_id)
}

/// Render a Homie numeric format: `min:max[:step]`.
///
/// Absent bounds stay blank. A step of 1 is the default and is omitted.
/// Returns `None` when nothing is known.
pub fn numeric_format(min: Option<f64>, max: Option<f64>, step: Option<f64>) -> Option<String> {
    let step = step.filter(|s| *s != 1.0);
    if min.is_none() && max.is_none() && step.is_none() {
        return None;
    }
    let mut format = format!(
        "{}:{}",
        min.map(render_number).unwrap_or_default(),
        max.map(render_number).unwrap_or_default()
    );
    if let Some(step) = step {
        format.push(':');
        format.push_str(&render_number(step));
    }
    Some(format)
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map one leaf to its Homie property.
pub fn leaf_to_property(leaf: &Leaf) -> Property {
    let retained = if leaf.kind.is_known() && leaf.bucket.is_classification() {
        true
    } else {
        leaf.access.is_state()
    };
    let mut attributes = PropertyAttributes {
        name: Some(leaf.label.clone()),
        format: None,
        settable: leaf.access.is_settable(),
        retained,
        unit: leaf.unit.clone(),
    };

    let datatype = match &leaf.kind {
        LeafKind::Text => Datatype::String,
        LeafKind::Binary { .. } => {
            attributes.format = leaf
                .binary_values()
                .map(|(on, off)| format!("{},{}", value_to_string(on), value_to_string(off)));
            Datatype::Boolean
        }
        LeafKind::Numeric { min, max, step } => {
            attributes.format = numeric_format(*min, *max, *step);
            match step {
                Some(s) if *s != 1.0 => Datatype::Float,
                _ => Datatype::Integer,
            }
        }
        LeafKind::Enum { values } => {
            attributes.format = Some(values.join(","));
            Datatype::Enum
        }
        LeafKind::List => Datatype::Json,
        LeafKind::Unknown(kind) => {
            tracing::trace!(kind = %kind, id = %leaf.id, "Unmapped expose type, using string");
            Datatype::String
        }
    };

    Property::new(datatype, attributes)
}

/// Translate a device into its Homie description.
///
/// `root` and `parent` are left unset; the caller attaches the device to
/// its bridge.
pub fn translate(device: &ZigbeeDevice, versions: &dyn VersionSource) -> Description {
    let mut description = Description::new(device.display_name(), versions.next_version());

    for leaf in device_leaves(device) {
        let bucket = leaf.bucket;
        let node = description
            .nodes
            .entry(bucket.node_id().to_string())
            .or_insert_with(|| Node::new(bucket.node_name()));
        if node.properties.contains_key(&leaf.id) {
            continue;
        }
        node.properties.insert(leaf.id.clone(), leaf_to_property(&leaf));
    }

    description
}
