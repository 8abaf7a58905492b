//! OSCQuery Core
//!
//! Core types and protocol primitives for OSCQuery, the discovery and
//! introspection layer over Open Sound Control.
//!
//! This crate provides:
//! - The OSC type model and type-tag parser ([`OscType`], [`parse_type_tag`])
//! - The method tree ([`Node`]) and its wire JSON shape ([`SerializedNode`])
//! - Binary OSC 1.0 message encoding/decoding ([`osc`])
//! - Host metadata ([`HostInfo`])

pub mod error;
pub mod node;
pub mod osc;
pub mod types;
pub mod wire;

pub use error::{Error, Result};
pub use node::{normalize_path, Node, NodeOptions};
pub use osc::{OscMessage, OscValue};
pub use types::{parse_type_tag, type_tag, Access, Argument, ClipMode, OscType, Range, SimpleType};
pub use wire::{HostInfo, OscTransport, SerializedNode};

/// mDNS service type advertised and browsed by OSCQuery peers
pub const OSCJSON_SERVICE_TYPE: &str = "_oscjson._tcp.local.";

/// Default advertised service name
pub const DEFAULT_SERVICE_NAME: &str = "OSCQuery";

/// Default description of the tree root
pub const DEFAULT_ROOT_DESCRIPTION: &str = "root node";
