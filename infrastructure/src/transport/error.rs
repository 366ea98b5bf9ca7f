//! Error types for the transport adapters

use thiserror::Error;
use tokio_tungstenite::tungstenite;
use toolwire_domain::ProtocolError;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while moving envelopes over a transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// One inbound frame could not be decoded; the connection itself is fine.
    #[error("Failed to parse envelope: {error}\nRaw frame: {raw}")]
    Malformed { error: String, raw: String },

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("Failed to spawn executor '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Read buffer too small: envelope needs {needed} bytes, {available} available")]
    Capacity { needed: usize, available: usize },

    #[error("Transport closed")]
    Closed,
}

impl From<tungstenite::Error> for TransportError {
    fn from(error: tungstenite::Error) -> Self {
        TransportError::WebSocket(Box::new(error))
    }
}

impl From<TransportError> for ProtocolError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Closed => ProtocolError::TransportClosed,
            TransportError::Json(e) => ProtocolError::Serialization(e),
            other => ProtocolError::Transport(other.to_string()),
        }
    }
}
