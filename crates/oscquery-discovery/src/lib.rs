//! OSCQuery Discovery
//!
//! Locates OSCQuery servers on the LAN and models their method trees:
//! - [`MdnsBrowser`] browses one or more mDNS service types and reports
//!   services coming up and going down
//! - [`OscQueryDiscovery`] composes browsing with HTTP ingestion of each
//!   discovered server's tree and HOST_INFO

pub mod browse;
pub mod client;
pub mod error;

pub use browse::{normalize_service_type, BrowseEvent, BrowsedService, MdnsBrowser, Protocol};
pub use client::{DiscoveredService, DiscoveryEvent, OscQueryDiscovery};
pub use error::{DiscoveryError, Result};
