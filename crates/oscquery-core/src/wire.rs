//! Wire JSON shapes served over HTTP and WebSocket
//!
//! Attribute keys are the upper-case names mandated by the OSCQuery
//! protocol; unset attributes are omitted entirely. The parallel
//! `VALUE`/`RANGE`/`CLIPMODE` arrays are always length-aligned with the
//! node's arguments, padded with `null`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Access, ClipMode, Range};

/// A node of the method tree in its wire JSON form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "FULL_PATH", default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,

    #[serde(rename = "CONTENTS", default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<HashMap<String, SerializedNode>>,

    #[serde(rename = "TYPE", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,

    #[serde(rename = "ACCESS", default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,

    #[serde(rename = "RANGE", default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Vec<Option<Range>>>,

    #[serde(rename = "CLIPMODE", default, skip_serializing_if = "Option::is_none")]
    pub clip_mode: Option<Vec<Option<ClipMode>>>,

    /// Values stay untyped JSON here; the declared TYPE directs their
    /// interpretation on ingestion.
    #[serde(rename = "VALUE", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<serde_json::Value>>,

    #[serde(rename = "DESCRIPTION", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "TAGS", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(rename = "CRITICAL", default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<bool>,
}

impl SerializedNode {
    /// Project a single attribute by its wire name. Returns JSON `null`
    /// when the attribute is not set on this node.
    pub fn attribute(&self, attr: &str) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove(attr).unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }
}

/// OSC transport protocol selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OscTransport {
    Tcp,
    #[default]
    Udp,
}

impl std::fmt::Display for OscTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OscTransport::Tcp => write!(f, "TCP"),
            OscTransport::Udp => write!(f, "UDP"),
        }
    }
}

/// Host metadata served for `?HOST_INFO` queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(rename = "NAME", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Supported protocol extensions, keyed by extension name
    #[serde(rename = "EXTENSIONS", default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, bool>>,

    #[serde(rename = "OSC_IP", default, skip_serializing_if = "Option::is_none")]
    pub osc_ip: Option<String>,

    #[serde(rename = "OSC_PORT", default, skip_serializing_if = "Option::is_none")]
    pub osc_port: Option<u16>,

    #[serde(rename = "OSC_TRANSPORT", default, skip_serializing_if = "Option::is_none")]
    pub osc_transport: Option<OscTransport>,

    #[serde(rename = "WS_IP", default, skip_serializing_if = "Option::is_none")]
    pub ws_ip: Option<String>,

    #[serde(rename = "WS_PORT", default, skip_serializing_if = "Option::is_none")]
    pub ws_port: Option<u16>,
}

impl HostInfo {
    /// Whether the host advertises a given extension
    pub fn supports(&self, extension: &str) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.get(extension))
            .copied()
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_attributes_omitted() {
        let node = SerializedNode {
            full_path: Some("/".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json, serde_json::json!({"FULL_PATH": "/"}));
    }

    #[test]
    fn test_wire_key_names() {
        let node = SerializedNode {
            full_path: Some("/a".to_string()),
            type_tag: Some("f".to_string()),
            access: Some(Access::ReadOnly),
            range: Some(vec![Some(Range::bounds(0.0, 100.0))]),
            clip_mode: Some(vec![Some(ClipMode::Both)]),
            value: Some(vec![serde_json::json!(0.5)]),
            description: Some("gain".to_string()),
            tags: Some(vec!["audio".to_string()]),
            critical: Some(false),
            contents: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "FULL_PATH",
            "TYPE",
            "ACCESS",
            "RANGE",
            "CLIPMODE",
            "VALUE",
            "DESCRIPTION",
            "TAGS",
            "CRITICAL",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(obj["ACCESS"], serde_json::json!(1));
        assert_eq!(obj["CLIPMODE"], serde_json::json!(["both"]));
    }

    #[test]
    fn test_attribute_projection() {
        let node = SerializedNode {
            type_tag: Some("if".to_string()),
            ..Default::default()
        };
        assert_eq!(node.attribute("TYPE"), serde_json::json!("if"));
        assert_eq!(node.attribute("VALUE"), serde_json::Value::Null);
    }

    #[test]
    fn test_host_info_roundtrip() {
        let hi = HostInfo {
            name: Some("TestServer".to_string()),
            extensions: Some(HashMap::from([
                ("VALUE".to_string(), true),
                ("LISTEN".to_string(), true),
            ])),
            osc_ip: Some("0.0.0.0".to_string()),
            osc_port: Some(9000),
            osc_transport: Some(OscTransport::Udp),
            ws_ip: Some("0.0.0.0".to_string()),
            ws_port: Some(9000),
        };
        let json = serde_json::to_value(&hi).unwrap();
        assert_eq!(json["OSC_TRANSPORT"], serde_json::json!("UDP"));
        let back: HostInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, hi);
        assert!(back.supports("LISTEN"));
        assert!(!back.supports("PATH_RENAMED"));
    }
}
