//! Homie topic layout.

use thiserror::Error;
use z2m_homie_core::BridgeConfig;

/// Attribute segment of an inbound command topic.
pub const SET_ATTRIBUTE: &str = "set";

/// Absolute topic of a device attribute or property, e.g.
/// `homie/5/<device>/$state` or `homie/5/<device>/<node>/<property>`.
pub fn device_topic(config: &BridgeConfig, device_id: &str, path: &str) -> String {
    format!("{}/{}/{}", config.namespace(), device_id, path)
}

/// Subscription filter matching every property `set` topic.
pub fn set_filter(config: &BridgeConfig) -> String {
    format!("{}/+/+/+/{}", config.namespace(), SET_ATTRIBUTE)
}

/// Why an inbound topic is not a command for a represented device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicRejection {
    #[error("unexpected topic prefix")]
    Prefix,
    #[error("unsupported Homie version {0}")]
    Version(String),
    #[error("expected 6 topic segments, got {0}")]
    Shape(usize),
    #[error("device {0} is not represented by this bridge")]
    ForeignDevice(String),
    #[error("attribute {0} is not a command")]
    Attribute(String),
}

/// A parsed `<prefix>/<version>/<device>/<node>/<property>/set` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTopic<'a> {
    pub device_id: &'a str,
    /// Device id with the bridge's device prefix removed
    pub ieee_address: &'a str,
    pub node_id: &'a str,
    pub property_id: &'a str,
}

impl<'a> SetTopic<'a> {
    /// Parse and check an inbound topic against the bridge configuration.
    ///
    /// Purely syntactic; nothing is resolved against the host.
    pub fn parse(topic: &'a str, config: &BridgeConfig) -> Result<Self, TopicRejection> {
        let rest = topic
            .strip_prefix(config.homie_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or(TopicRejection::Prefix)?;

        let segments: Vec<&'a str> = rest.split('/').collect();
        if let Some(version) = segments.first() {
            if *version != config.homie_version {
                return Err(TopicRejection::Version(version.to_string()));
            }
        }
        let &[_, device_id, node_id, property_id, attribute] = segments.as_slice() else {
            return Err(TopicRejection::Shape(segments.len() + 1));
        };

        let ieee_address = config
            .ieee_from_device_id(device_id)
            .ok_or_else(|| TopicRejection::ForeignDevice(device_id.to_string()))?;
        if attribute != SET_ATTRIBUTE {
            return Err(TopicRejection::Attribute(attribute.to_string()));
        }

        Ok(Self {
            device_id,
            ieee_address,
            node_id,
            property_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BridgeConfig {
        BridgeConfig::default()
    }

    #[test]
    fn test_topics() {
        let config = config();
        assert_eq!(
            device_topic(&config, "z2m-0x01", "$state"),
            "homie/5/z2m-0x01/$state"
        );
        assert_eq!(set_filter(&config), "homie/5/+/+/+/set");
    }

    #[test]
    fn test_parse_set_topic() {
        let config = config();
        let topic = SetTopic::parse("homie/5/z2m-0x01/primary/state/set", &config).unwrap();
        assert_eq!(topic.device_id, "z2m-0x01");
        assert_eq!(topic.ieee_address, "0x01");
        assert_eq!(topic.node_id, "primary");
        assert_eq!(topic.property_id, "state");
    }

    #[test]
    fn test_parse_rejections() {
        let config = config();
        assert_eq!(
            SetTopic::parse("other/5/z2m-0x01/primary/state/set", &config),
            Err(TopicRejection::Prefix)
        );
        assert_eq!(
            SetTopic::parse("homie/4/z2m-0x01/primary/state/set", &config),
            Err(TopicRejection::Version("4".to_string()))
        );
        assert_eq!(
            SetTopic::parse("homie/5/z2m-0x01/state/set", &config),
            Err(TopicRejection::Shape(5))
        );
        assert_eq!(
            SetTopic::parse("homie/5/zigbee2mqtt-bridge/primary/state/set", &config),
            Err(TopicRejection::ForeignDevice("zigbee2mqtt-bridge".to_string()))
        );
        assert_eq!(
            SetTopic::parse("homie/5/z2m-0x01/primary/state/get", &config),
            Err(TopicRejection::Attribute("get".to_string()))
        );
    }

    #[test]
    fn test_prefix_must_be_whole_segment() {
        let config = config();
        assert_eq!(
            SetTopic::parse("homies/5/z2m-0x01/primary/state/set", &config),
            Err(TopicRejection::Prefix)
        );
    }
}
