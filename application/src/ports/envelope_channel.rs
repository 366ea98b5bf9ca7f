//! Envelope channel port
//!
//! The application layer's view of one multiplexed connection. The
//! infrastructure layer implements it on top of a transport plus the
//! stream multiplexer; use cases only ever see this trait.

use async_trait::async_trait;
use std::time::Duration;
use toolwire_domain::{Envelope, EnvelopeKind, ProtocolError};

/// One duplex, multiplexed envelope connection.
#[async_trait]
pub trait EnvelopeChannel: Send + Sync {
    /// Send `outbound` and wait for the first envelope on the same stream
    /// whose kind is `expected`.
    ///
    /// Interim envelopes of other kinds on that stream are discarded. The
    /// subscription is registered before the write and released on every
    /// exit path.
    async fn correlated_request(
        &self,
        outbound: Envelope,
        expected: EnvelopeKind,
        deadline: Duration,
    ) -> Result<Envelope, ProtocolError>;

    /// Next envelope from the general queue, in arrival order.
    ///
    /// Returns [`ProtocolError::TransportClosed`] once the connection has
    /// ended and nothing is left to drain.
    async fn next_general(&self) -> Result<Envelope, ProtocolError>;

    /// Push an envelope to the far side; returns once it has been flushed.
    async fn emit(&self, envelope: Envelope) -> Result<(), ProtocolError>;
}
