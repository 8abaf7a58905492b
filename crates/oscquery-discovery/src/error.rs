//! Error types for OSCQuery discovery

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// OSCQuery discovery error types
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// mDNS responder error
    #[error("mdns error: {0}")]
    Mdns(String),

    /// Tree or HOST_INFO fetch failed
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Discovered address is not IPv4
    #[error("only IPv4 services can be queried")]
    AddressFamilyUnsupported,

    #[error(transparent)]
    Core(#[from] oscquery_core::Error),
}
