//! Protocol error taxonomy shared by every layer.

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Failures surfaced to the orchestration loop.
///
/// Nothing here is retried internally: the caller owns retry and abort policy.
/// A declined tool call is not an error and never shows up in this enum.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Malformed caller input, rejected before any I/O.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No terminal response (or bootstrap sentinel) within the deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The underlying connection ended while a wait was outstanding.
    #[error("Transport closed")]
    TransportClosed,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProtocolError {
    /// Check if this error is a deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtocolError::Timeout(_))
    }

    /// Check if this error means the connection is gone
    pub fn is_closed(&self) -> bool {
        matches!(self, ProtocolError::TransportClosed)
    }
}
