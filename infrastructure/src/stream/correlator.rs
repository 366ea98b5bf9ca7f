//! Request/response correlation over the multiplexer.
//!
//! The subscription for the outbound `streamId` is registered *before* the
//! request is written, so a fast responder can never slip its reply past
//! us. The subscription is released on every exit path: success, deadline,
//! transport failure, or the caller dropping the future.

use super::multiplexer::{StreamMultiplexer, Subscription};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use toolwire_domain::{Envelope, EnvelopeKind, ProtocolError};
use tracing::debug;

/// Send `outbound` through `send` and wait for the first envelope on the
/// same stream whose kind is `expected`.
///
/// The deadline covers both the write and the wait, measured from entry.
/// Envelopes of other kinds on the stream (acknowledgments, progress) are
/// discarded.
pub async fn correlated_request<F, Fut>(
    multiplexer: &StreamMultiplexer,
    outbound: Envelope,
    expected: &EnvelopeKind,
    deadline: Duration,
    send: F,
) -> Result<Envelope, ProtocolError>
where
    F: FnOnce(Envelope) -> Fut,
    Fut: Future<Output = Result<(), ProtocolError>>,
{
    if !outbound.is_correlated() {
        return Err(ProtocolError::Validation(
            "correlated request requires a non-empty streamId".to_string(),
        ));
    }

    let deadline_at = Instant::now() + deadline;
    let stream_id = outbound.stream_id.clone();
    let mut subscription = multiplexer.subscribe(&stream_id)?;

    let exchange = async {
        send(outbound).await?;
        await_terminal(&mut subscription, expected).await
    };
    let outcome = match tokio::time::timeout_at(deadline_at, exchange).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ProtocolError::Timeout(format!(
            "no {} for stream {} within {:?}",
            expected, stream_id, deadline
        ))),
    };

    drop(subscription);
    outcome
}

async fn await_terminal(
    subscription: &mut Subscription,
    expected: &EnvelopeKind,
) -> Result<Envelope, ProtocolError> {
    loop {
        let envelope = subscription.recv().await?;
        if envelope.kind == *expected {
            return Ok(envelope);
        }
        debug!(
            "Correlator: discarding interim {} on stream {}",
            envelope.kind,
            subscription.stream_id()
        );
    }
}
