//! Infrastructure layer for toolwire
//!
//! This crate contains the transports, the stream multiplexer and the
//! [`Connection`] that implements the application's
//! [`EnvelopeChannel`](toolwire_application::EnvelopeChannel) port, plus
//! configuration file loading and the JSONL exchange logger.

pub mod config;
pub mod logging;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use logging::JsonlExchangeLogger;
pub use stream::{
    connection::Connection,
    correlator::correlated_request,
    multiplexer::{StreamMultiplexer, Subscription},
};
pub use transport::{
    EnvelopeReader, EnvelopeWriter,
    byte_stream::ByteStreamAdapter,
    error::{Result, TransportError},
    lines::{LineReader, LineWriter, line_transport},
    origin::OriginPolicy,
    process::{ExecutorProcess, spawn_executor},
    websocket::{WebSocketReader, WebSocketWriter, accept_websocket, connect_websocket},
};
