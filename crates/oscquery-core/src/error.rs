//! Error types for OSCQuery core

use thiserror::Error;

/// Result type alias for OSCQuery core operations
pub type Result<T> = std::result::Result<T, Error>;

/// OSCQuery core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Binary packet cannot be framed as an OSC message
    #[error("malformed OSC packet: {0}")]
    MalformedOsc(String),

    /// No node exists at the given address
    #[error("no node at {0}")]
    UnknownPath(String),

    /// Value assignment to an argument index past the declared set
    #[error("argument index {index} out of range ({len} arguments declared)")]
    InvalidIndex { index: usize, len: usize },

    /// Wire JSON encode/decode error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
