//! Translation of real-world Zigbee2MQTT device documents.

use serde_json::json;
use z2m_homie_devices::translator::{CONFIG_NODE, DIAGNOSTIC_NODE, PRIMARY_NODE};
use z2m_homie_devices::{Datatype, FixedVersion, ZigbeeDevice, parse_devices, translate};

fn devices_document() -> Vec<u8> {
    serde_json::to_vec(&json!([
        {
            "ieee_address": "0x0000000000000000",
            "type": "Coordinator",
            "interview_completed": true,
            "interviewing": false
        },
        {
            "ieee_address": "0x680ae2fffe4577ac",
            "friendly_name": "hallway_bulb",
            "type": "Router",
            "interview_completed": true,
            "interviewing": false,
            "definition": {
                "model": "LED1836G9",
                "vendor": "IKEA",
                "exposes": [
                    {
                        "type": "light",
                        "features": [
                            {"type": "binary", "name": "state", "label": "State", "property": "state",
                             "access": 7, "value_on": "ON", "value_off": "OFF", "value_toggle": "TOGGLE"},
                            {"type": "numeric", "name": "brightness", "label": "Brightness",
                             "property": "brightness", "access": 7, "value_min": 0, "value_max": 254},
                            {"type": "composite", "name": "color_xy", "label": "Color (X/Y)",
                             "property": "color", "access": 7,
                             "features": [
                                 {"type": "numeric", "name": "x", "label": "X", "property": "x", "access": 7},
                                 {"type": "numeric", "name": "y", "label": "Y", "property": "y", "access": 7}
                             ]}
                        ]
                    },
                    {"type": "enum", "name": "effect", "label": "Effect", "property": "effect",
                     "access": 2, "values": ["blink", "breathe", "okay"]},
                    {"type": "enum", "name": "power_on_behavior", "label": "Power-on behavior",
                     "property": "power_on_behavior", "access": 7, "category": "config",
                     "values": ["off", "on", "toggle", "previous"]},
                    {"type": "numeric", "name": "linkquality", "label": "Linkquality",
                     "property": "linkquality", "access": 1, "unit": "lqi",
                     "value_min": 0, "value_max": 255, "category": "diagnostic"}
                ],
                "options": [
                    {"type": "numeric", "name": "transition", "label": "Transition",
                     "property": "transition", "access": 2, "value_min": 0, "value_step": 0.1}
                ]
            }
        },
        {
            "ieee_address": "0x00158d0008a1b2c3",
            "friendly_name": "new_sensor",
            "type": "EndDevice",
            "interview_completed": false,
            "interviewing": true
        }
    ]))
    .unwrap()
}

fn bulb() -> ZigbeeDevice {
    parse_devices(&devices_document())
        .unwrap()
        .into_iter()
        .find(|d| d.ieee_address == "0x680ae2fffe4577ac")
        .unwrap()
}

#[test]
fn test_only_interviewed_devices_are_eligible() {
    let devices = parse_devices(&devices_document()).unwrap();
    let eligible: Vec<_> = devices
        .iter()
        .filter(|d| d.is_eligible())
        .map(|d| d.ieee_address.as_str())
        .collect();
    assert_eq!(eligible, vec!["0x680ae2fffe4577ac"]);
}

#[test]
fn test_bulb_nodes() {
    let description = translate(&bulb(), &FixedVersion(1_700_000_000_000));
    assert_eq!(description.name.as_deref(), Some("hallway_bulb"));
    assert_eq!(
        description.nodes.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![CONFIG_NODE, DIAGNOSTIC_NODE, PRIMARY_NODE]
    );

    let primary = &description.nodes[PRIMARY_NODE];
    assert_eq!(
        primary.properties.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["brightness", "effect", "state", "x", "y"]
    );

    let state = &primary.properties["state"];
    assert_eq!(state.datatype(), Datatype::Boolean);
    assert_eq!(state.format(), Some("ON,OFF"));
    assert_eq!(state.name(), Some("light: State"));

    assert_eq!(primary.properties["x"].name(), Some("light: Color (X/Y): X"));
    assert_eq!(primary.properties["brightness"].format(), Some("0:254"));

    let effect = &primary.properties["effect"];
    assert!(effect.is_settable());
    assert!(!effect.is_retained());
    assert_eq!(effect.format(), Some("blink,breathe,okay"));
}

#[test]
fn test_bulb_classification_nodes() {
    let description = translate(&bulb(), &FixedVersion(1));

    let config = &description.nodes[CONFIG_NODE];
    assert_eq!(config.name.as_deref(), Some("Configuration"));
    let transition = &config.properties["transition"];
    assert_eq!(transition.datatype(), Datatype::Float);
    assert_eq!(transition.format(), Some("0::0.1"));
    assert!(transition.is_retained());
    assert!(config.properties["power_on_behavior"].is_retained());

    let linkquality = &description.nodes[DIAGNOSTIC_NODE].properties["linkquality"];
    assert_eq!(linkquality.unit(), Some("lqi"));
    assert!(!linkquality.is_settable());
    assert!(linkquality.is_retained());
}

#[test]
fn test_description_payload_is_stable() {
    let device = bulb();
    let first = translate(&device, &FixedVersion(5)).to_payload().unwrap();
    let second = translate(&device, &FixedVersion(5)).to_payload().unwrap();
    assert_eq!(first, second);

    let value: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(value["homie"], "5.0");
    assert!(value.get("root").is_none());
    assert_eq!(
        value["nodes"]["primary"]["properties"]["brightness"],
        json!({
            "datatype": "integer",
            "name": "light: Brightness",
            "format": "0:254",
            "settable": true,
            "retained": true
        })
    );
}
