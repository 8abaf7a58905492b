//! Error types for the OSCQuery server

use thiserror::Error;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// OSCQuery server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Port in use or interface unavailable
    #[error("bind failed: {0}")]
    Bind(#[from] std::io::Error),

    /// Query parameter outside the allowed attribute set
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// HTTP method other than GET or OPTIONS
    #[error("method not allowed")]
    MethodNotAllowed,

    /// mDNS responder error
    #[error("mdns error: {0}")]
    Mdns(String),

    #[error(transparent)]
    Core(#[from] oscquery_core::Error),
}
