//! Conversion between device state values and Homie payloads.

use crate::homie::{Datatype, Property};
use crate::translator::Leaf;
use serde_json::Value;

/// Render a state value as the payload of a Homie property topic.
///
/// Returns `None` for null, which is never published. For boolean
/// properties, values matching the on/off entries of the format are
/// rendered as `true`/`false`.
pub fn encode_state(property: &Property, value: &Value) -> Option<String> {
    if property.datatype() == Datatype::Boolean {
        if let Some(encoded) = encode_binary(property.format(), value) {
            return Some(encoded.to_string());
        }
    }

    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn encode_binary(format: Option<&str>, value: &Value) -> Option<bool> {
    let (on, off) = format?.split_once(',')?;
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    if raw == on {
        Some(true)
    } else if raw == off {
        Some(false)
    } else {
        None
    }
}

/// Decode an inbound `set` payload into the value sent to the device.
///
/// The payload is parsed as JSON and otherwise taken as a plain string.
/// For binary leaves `true`/`false` map back to the device's own on/off
/// values.
pub fn decode_command(payload: &str, leaf: Option<&Leaf>) -> Value {
    let value = serde_json::from_str::<Value>(payload.trim())
        .unwrap_or_else(|_| Value::String(payload.to_string()));

    match (leaf.and_then(Leaf::binary_values), &value) {
        (Some((on, _)), Value::Bool(true)) => on.clone(),
        (Some((_, off)), Value::Bool(false)) => off.clone(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homie::PropertyAttributes;
    use crate::translator::{Bucket, LeafKind};
    use crate::zigbee::Access;
    use serde_json::json;

    fn property(datatype: Datatype, format: Option<&str>) -> Property {
        let mut attributes = PropertyAttributes::new("x");
        attributes.format = format.map(str::to_string);
        Property::new(datatype, attributes)
    }

    fn binary_leaf() -> Leaf {
        Leaf {
            id: "state".to_string(),
            label: "State".to_string(),
            access: Access::ALL,
            bucket: Bucket::Primary,
            unit: None,
            kind: LeafKind::Binary {
                value_on: Some(json!("ON")),
                value_off: Some(json!("OFF")),
            },
        }
    }

    #[test]
    fn test_encode_scalars() {
        let string = property(Datatype::String, None);
        assert_eq!(encode_state(&string, &json!("hello")).as_deref(), Some("hello"));
        assert_eq!(encode_state(&string, &json!(null)), None);

        let integer = property(Datatype::Integer, None);
        assert_eq!(encode_state(&integer, &json!(254)).as_deref(), Some("254"));

        let float = property(Datatype::Float, None);
        assert_eq!(encode_state(&float, &json!(21.5)).as_deref(), Some("21.5"));
    }

    #[test]
    fn test_encode_binary_values() {
        let boolean = property(Datatype::Boolean, Some("ON,OFF"));
        assert_eq!(encode_state(&boolean, &json!("ON")).as_deref(), Some("true"));
        assert_eq!(encode_state(&boolean, &json!("OFF")).as_deref(), Some("false"));
        assert_eq!(encode_state(&boolean, &json!(true)).as_deref(), Some("true"));

        let plain = property(Datatype::Boolean, None);
        assert_eq!(encode_state(&plain, &json!(false)).as_deref(), Some("false"));
    }

    #[test]
    fn test_encode_structured_as_json() {
        let json_prop = property(Datatype::Json, None);
        assert_eq!(
            encode_state(&json_prop, &json!({"x": 0.3, "y": 0.4})).as_deref(),
            Some(r#"{"x":0.3,"y":0.4}"#)
        );
        assert_eq!(encode_state(&json_prop, &json!([1, 2])).as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_decode_command() {
        assert_eq!(decode_command("42", None), json!(42));
        assert_eq!(decode_command("\"blink\"", None), json!("blink"));
        assert_eq!(decode_command("blink", None), json!("blink"));
        assert_eq!(decode_command("{\"x\":1}", None), json!({"x": 1}));
    }

    #[test]
    fn test_decode_binary_maps_to_device_values() {
        let leaf = binary_leaf();
        assert_eq!(decode_command("true", Some(&leaf)), json!("ON"));
        assert_eq!(decode_command("false", Some(&leaf)), json!("OFF"));
        assert_eq!(decode_command("TOGGLE", Some(&leaf)), json!("TOGGLE"));
    }
}
