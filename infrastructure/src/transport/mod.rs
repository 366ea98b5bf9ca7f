//! Duplex envelope transports.
//!
//! A transport is split into an [`EnvelopeReader`] (owned exclusively by the
//! multiplexer's background task) and an [`EnvelopeWriter`] (owned by the
//! caller side). Realizations:
//!
//! | Module | Framing | Typical peer |
//! |--------|---------|--------------|
//! | [`lines`] | newline-terminated JSON over any byte stream | local executor process (stdio) |
//! | [`websocket`] | one JSON envelope per text frame | remote client |
//! | [`byte_stream`] | re-frames any reader as newline JSON bytes | byte-stream consumers driven by a socket |
//!
//! Writers do not lock internally. The single-writer convention is upheld
//! by [`Connection`](crate::stream::connection::Connection), which owns the
//! writer behind an async mutex.

pub mod byte_stream;
pub mod error;
pub mod lines;
pub mod origin;
pub mod process;
pub mod websocket;

use async_trait::async_trait;
use error::{Result, TransportError};
use toolwire_domain::Envelope;
use tracing::trace;

/// Inbound half of a transport.
#[async_trait]
pub trait EnvelopeReader: Send {
    /// Block until the next inbound envelope.
    ///
    /// `Ok(None)` is a benign close. [`TransportError::Malformed`] reports a
    /// single undecodable frame; any other error means the transport is
    /// unusable.
    async fn read(&mut self) -> Result<Option<Envelope>>;
}

/// Outbound half of a transport.
#[async_trait]
pub trait EnvelopeWriter: Send {
    /// Serialize, send and flush one envelope.
    async fn write(&mut self, envelope: &Envelope) -> Result<()>;

    /// Signal a normal end of the exchange to the far side.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: EnvelopeReader + ?Sized> EnvelopeReader for Box<T> {
    async fn read(&mut self) -> Result<Option<Envelope>> {
        (**self).read().await
    }
}

#[async_trait]
impl<T: EnvelopeWriter + ?Sized> EnvelopeWriter for Box<T> {
    async fn write(&mut self, envelope: &Envelope) -> Result<()> {
        (**self).write(envelope).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Decode one raw frame into an envelope.
pub(crate) fn decode_frame(raw: &str) -> Result<Envelope> {
    trace!("Transport received: {}", raw);
    serde_json::from_str(raw).map_err(|e| TransportError::Malformed {
        error: e.to_string(),
        raw: raw.to_string(),
    })
}
