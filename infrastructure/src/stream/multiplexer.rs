//! Stream multiplexer: fan-out of one inbound envelope stream.
//!
//! A single background reader task owns the transport's read half and
//! delivers every inbound envelope to the **general queue**. Envelopes with a
//! non-empty `streamId` are additionally delivered to the per-stream queue of
//! a live [`Subscription`] for that id, if one exists:
//!
//! ```text
//!                       ┌──────────────► general queue (every envelope)
//! transport ─► reader ──┤
//!                       └──(streamId)──► subscription queue (if subscribed)
//! ```
//!
//! Both queues are bounded. A full queue applies backpressure to the reader,
//! so the owner of the multiplexer must keep draining the general queue via
//! [`next_general`](StreamMultiplexer::next_general).
//!
//! When the transport closes or fails, or [`shutdown`](StreamMultiplexer::shutdown)
//! is called, every pending and future receive resolves with
//! [`ProtocolError::TransportClosed`] once buffered envelopes are consumed.

use crate::transport::EnvelopeReader;
use crate::transport::error::TransportError;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toolwire_application::ProtocolParams;
use toolwire_domain::{Envelope, ProtocolError};
use tracing::{debug, info, trace, warn};

struct Route {
    serial: u64,
    tx: mpsc::Sender<Envelope>,
}

/// Stream id -> per-stream sender.
///
/// Uses `std::sync::RwLock` so that [`Subscription::drop`] can deregister
/// synchronously. The lock is held only for map operations, never across an
/// await.
struct SubscriptionRegistry {
    routes: std::sync::RwLock<HashMap<String, Route>>,
    next_serial: AtomicU64,
}

impl SubscriptionRegistry {
    fn new() -> Self {
        Self {
            routes: std::sync::RwLock::new(HashMap::new()),
            next_serial: AtomicU64::new(1),
        }
    }

    fn insert(&self, stream_id: &str, tx: mpsc::Sender<Envelope>) -> Result<u64, ProtocolError> {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        if routes.contains_key(stream_id) {
            return Err(ProtocolError::Validation(format!(
                "stream {} already has a live subscription",
                stream_id
            )));
        }
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        routes.insert(stream_id.to_string(), Route { serial, tx });
        Ok(serial)
    }

    fn sender(&self, stream_id: &str) -> Option<mpsc::Sender<Envelope>> {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.get(stream_id).map(|route| route.tx.clone())
    }

    fn remove(&self, stream_id: &str) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.remove(stream_id).is_some()
    }

    /// Remove the route only if it still belongs to the given subscription.
    fn release(&self, stream_id: &str, serial: u64) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        if routes
            .get(stream_id)
            .is_some_and(|route| route.serial == serial)
        {
            routes.remove(stream_id);
            debug!("Multiplexer: released subscription {}", stream_id);
        }
    }

    fn clear(&self) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.clear();
    }

    fn len(&self) -> usize {
        self.routes.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Receiving end of one stream id's queue.
///
/// Dropping the subscription deregisters it, so it is released on every
/// exit path including cancellation of the owning future.
pub struct Subscription {
    stream_id: String,
    serial: u64,
    rx: mpsc::Receiver<Envelope>,
    shutdown: CancellationToken,
    registry: Arc<SubscriptionRegistry>,
}

impl Subscription {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Next envelope for this stream id.
    ///
    /// Buffered envelopes are returned even after shutdown; once the queue is
    /// empty, shutdown or explicit unsubscription yields
    /// [`ProtocolError::TransportClosed`].
    pub async fn recv(&mut self) -> Result<Envelope, ProtocolError> {
        tokio::select! {
            biased;
            msg = self.rx.recv() => msg.ok_or(ProtocolError::TransportClosed),
            _ = self.shutdown.cancelled() => {
                self.rx.try_recv().map_err(|_| ProtocolError::TransportClosed)
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(&self.stream_id, self.serial);
    }
}

enum Delivery {
    Sent,
    ReceiverGone,
    Shutdown,
}

pub struct StreamMultiplexer {
    /// Background reader task handle.
    _reader_handle: JoinHandle<()>,
    registry: Arc<SubscriptionRegistry>,
    general_rx: Mutex<mpsc::Receiver<Envelope>>,
    stream_queue_capacity: usize,
    shutdown: CancellationToken,
}

impl StreamMultiplexer {
    /// Take ownership of `reader` and start the background reader task.
    pub fn spawn<R>(reader: R, params: &ProtocolParams) -> Self
    where
        R: EnvelopeReader + 'static,
    {
        let (general_tx, general_rx) = mpsc::channel(params.general_queue_capacity.max(1));
        let registry = Arc::new(SubscriptionRegistry::new());
        let shutdown = CancellationToken::new();

        let registry_bg = Arc::clone(&registry);
        let shutdown_bg = shutdown.clone();
        let reader_handle = tokio::spawn(async move {
            Self::reader_loop(reader, general_tx, registry_bg, shutdown_bg).await;
        });

        Self {
            _reader_handle: reader_handle,
            registry,
            general_rx: Mutex::new(general_rx),
            stream_queue_capacity: params.stream_queue_capacity.max(1),
            shutdown,
        }
    }

    /// Background reader loop, single owner of the transport's read half.
    ///
    /// Per envelope: stamp the timestamp, push to the general queue, then
    /// forward to the subscription for its `streamId` (looked up after the
    /// general push). Malformed frames are logged and skipped. On close or
    /// error the shutdown token is cancelled so every waiter is released.
    async fn reader_loop<R: EnvelopeReader>(
        mut reader: R,
        general_tx: mpsc::Sender<Envelope>,
        registry: Arc<SubscriptionRegistry>,
        shutdown: CancellationToken,
    ) {
        loop {
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Multiplexer: shutdown requested, stopping reader");
                    break;
                }
                read = reader.read() => read,
            };

            let mut envelope = match read {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    info!("Multiplexer: transport closed");
                    break;
                }
                Err(TransportError::Malformed { error, raw }) => {
                    warn!("Multiplexer: dropping malformed frame: {} ({})", error, raw);
                    continue;
                }
                Err(e) => {
                    warn!("Multiplexer: transport failed: {}", e);
                    break;
                }
            };

            envelope.fill_timestamp();
            trace!(
                "Multiplexer: inbound {} stream={:?}",
                envelope.kind, envelope.stream_id
            );

            let forward = envelope.is_correlated().then(|| envelope.clone());

            match Self::deliver(&general_tx, envelope, &shutdown).await {
                Delivery::Sent | Delivery::ReceiverGone => {}
                Delivery::Shutdown => break,
            }

            let Some(envelope) = forward else {
                continue;
            };
            let Some(tx) = registry.sender(&envelope.stream_id) else {
                trace!(
                    "Multiplexer: no subscription for stream {}",
                    envelope.stream_id
                );
                continue;
            };
            let stream_id = envelope.stream_id.clone();
            match Self::deliver(&tx, envelope, &shutdown).await {
                Delivery::Sent => {}
                Delivery::ReceiverGone => {
                    debug!("Multiplexer: subscriber for {} went away", stream_id);
                }
                Delivery::Shutdown => break,
            }
        }

        info!("Multiplexer: reader loop ended, closing all queues");
        shutdown.cancel();
        registry.clear();
    }

    async fn deliver(
        tx: &mpsc::Sender<Envelope>,
        envelope: Envelope,
        shutdown: &CancellationToken,
    ) -> Delivery {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Delivery::Shutdown,
            sent = tx.send(envelope) => match sent {
                Ok(()) => Delivery::Sent,
                Err(_) => Delivery::ReceiverGone,
            },
        }
    }

    /// Register interest in `stream_id`.
    ///
    /// Only envelopes read after this call returns are forwarded. At most one
    /// live subscription per id; a second subscribe fails with
    /// [`ProtocolError::Validation`].
    pub fn subscribe(&self, stream_id: &str) -> Result<Subscription, ProtocolError> {
        if stream_id.is_empty() {
            return Err(ProtocolError::Validation(
                "cannot subscribe to an empty stream id".to_string(),
            ));
        }
        if self.shutdown.is_cancelled() {
            return Err(ProtocolError::TransportClosed);
        }

        let (tx, rx) = mpsc::channel(self.stream_queue_capacity);
        let serial = self.registry.insert(stream_id, tx)?;
        debug!("Multiplexer: subscribed to stream {}", stream_id);

        Ok(Subscription {
            stream_id: stream_id.to_string(),
            serial,
            rx,
            shutdown: self.shutdown.clone(),
            registry: Arc::clone(&self.registry),
        })
    }

    /// Remove the subscription for `stream_id`, if any.
    ///
    /// Later envelopes for that id reach the general queue only. The
    /// [`Subscription`] holder observes [`ProtocolError::TransportClosed`]
    /// once its buffered envelopes are consumed.
    pub fn unsubscribe(&self, stream_id: &str) -> bool {
        let removed = self.registry.remove(stream_id);
        if removed {
            debug!("Multiplexer: unsubscribed from stream {}", stream_id);
        }
        removed
    }

    /// Next envelope from the general queue.
    pub async fn next_general(&self) -> Result<Envelope, ProtocolError> {
        let mut rx = self.general_rx.lock().await;
        tokio::select! {
            biased;
            msg = rx.recv() => msg.ok_or(ProtocolError::TransportClosed),
            _ = self.shutdown.cancelled() => {
                rx.try_recv().map_err(|_| ProtocolError::TransportClosed)
            }
        }
    }

    /// Stop the reader task and release every waiter. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!("Multiplexer: shutting down");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when the multiplexer stops for any reason.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }
}

impl Drop for StreamMultiplexer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::lines::{LineReader, LineWriter};
    use crate::transport::EnvelopeWriter;
    use std::time::Duration;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
    use tokio::time::timeout;
    use toolwire_domain::EnvelopeKind;

    const DEADLINE: Duration = Duration::from_secs(2);

    type FarWriter = LineWriter<WriteHalf<DuplexStream>>;

    /// A multiplexer reading from one end of a pipe, and a writer feeding it.
    fn pipe(params: &ProtocolParams) -> (StreamMultiplexer, FarWriter, ReadHalf<DuplexStream>) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (near_read, _near_write) = tokio::io::split(near);
        let (far_read, far_write) = tokio::io::split(far);
        let mux = StreamMultiplexer::spawn(LineReader::new(near_read), params);
        (mux, LineWriter::new(far_write), far_read)
    }

    fn response(stream_id: &str, content: &str) -> Envelope {
        Envelope::new(EnvelopeKind::StreamResponseTool)
            .with_stream_id(stream_id)
            .with_content(content)
    }

    #[tokio::test]
    async fn every_envelope_reaches_the_general_queue_in_order() {
        let (mux, mut far, _keep) = pipe(&ProtocolParams::default());

        far.write(&Envelope::new(EnvelopeKind::conversation("user")).with_content("1"))
            .await
            .unwrap();
        far.write(&response("s1", "2")).await.unwrap();
        far.write(&Envelope::new(EnvelopeKind::conversation("assistant")).with_content("3"))
            .await
            .unwrap();

        for expected in ["1", "2", "3"] {
            let envelope = timeout(DEADLINE, mux.next_general()).await.unwrap().unwrap();
            assert_eq!(envelope.content, expected);
            assert!(envelope.timestamp.is_some());
        }
    }

    #[tokio::test]
    async fn subscriber_receives_envelopes_for_its_stream_id() {
        let (mux, mut far, _keep) = pipe(&ProtocolParams::default());
        let mut sub = mux.subscribe("call-1").unwrap();

        far.write(&response("other", "no")).await.unwrap();
        far.write(&response("call-1", "yes")).await.unwrap();

        let got = timeout(DEADLINE, sub.recv()).await.unwrap().unwrap();
        assert_eq!(got.content, "yes");

        // The general queue saw both, in wire order.
        assert_eq!(mux.next_general().await.unwrap().content, "no");
        assert_eq!(mux.next_general().await.unwrap().content, "yes");
    }

    #[tokio::test]
    async fn subscribe_before_write_never_misses_the_response() {
        let (mux, mut far, _keep) = pipe(&ProtocolParams::default());

        for trial in 0..50 {
            let id = format!("trial-{}", trial);
            let mut sub = mux.subscribe(&id).unwrap();
            far.write(&response(&id, "done")).await.unwrap();

            let got = timeout(DEADLINE, sub.recv()).await.unwrap().unwrap();
            assert_eq!(got.stream_id, id);
            timeout(DEADLINE, mux.next_general()).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn duplicate_subscription_is_rejected() {
        let (mux, _far, _keep) = pipe(&ProtocolParams::default());
        let _first = mux.subscribe("dup").unwrap();
        assert!(matches!(
            mux.subscribe("dup"),
            Err(ProtocolError::Validation(_))
        ));
        assert!(matches!(mux.subscribe(""), Err(ProtocolError::Validation(_))));
    }

    #[tokio::test]
    async fn dropping_a_subscription_deregisters_it() {
        let (mux, mut far, _keep) = pipe(&ProtocolParams::default());
        {
            let _sub = mux.subscribe("temp").unwrap();
            assert_eq!(mux.subscription_count(), 1);
        }
        assert_eq!(mux.subscription_count(), 0);

        // A late envelope for that id still reaches the general queue.
        far.write(&response("temp", "late")).await.unwrap();
        let got = timeout(DEADLINE, mux.next_general()).await.unwrap().unwrap();
        assert_eq!(got.content, "late");

        // The id can be subscribed again.
        let _again = mux.subscribe("temp").unwrap();
    }

    #[tokio::test]
    async fn stale_guard_does_not_remove_a_newer_subscription() {
        let (mux, _far, _keep) = pipe(&ProtocolParams::default());
        let old = mux.subscribe("id").unwrap();
        assert!(mux.unsubscribe("id"));
        let _new = mux.subscribe("id").unwrap();

        drop(old);
        assert_eq!(mux.subscription_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribed_holder_sees_closed() {
        let (mux, _far, _keep) = pipe(&ProtocolParams::default());
        let mut sub = mux.subscribe("gone").unwrap();
        assert!(mux.unsubscribe("gone"));
        assert!(!mux.unsubscribe("gone"));

        let err = timeout(DEADLINE, sub.recv()).await.unwrap().unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn transport_close_unblocks_all_waiters() {
        let (mux, far, keep) = pipe(&ProtocolParams::default());
        let mut sub = mux.subscribe("pending").unwrap();

        let waiter = async {
            let (general, stream) = tokio::join!(mux.next_general(), sub.recv());
            (general, stream)
        };
        let closer = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(far);
            drop(keep);
        };

        let ((general, stream), ()) = timeout(DEADLINE, async { tokio::join!(waiter, closer) })
            .await
            .unwrap();
        assert!(general.unwrap_err().is_closed());
        assert!(stream.unwrap_err().is_closed());
        assert!(mux.is_shut_down());
        assert!(matches!(
            mux.subscribe("after"),
            Err(ProtocolError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn buffered_envelopes_survive_transport_close() {
        let (mux, mut far, keep) = pipe(&ProtocolParams::default());
        far.write(&Envelope::new(EnvelopeKind::conversation("user")).with_content("kept"))
            .await
            .unwrap();
        far.close().await.unwrap();
        drop(keep);

        timeout(DEADLINE, mux.shutdown_token().cancelled())
            .await
            .unwrap();
        assert_eq!(mux.next_general().await.unwrap().content, "kept");
        assert!(mux.next_general().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn explicit_shutdown_releases_waiters_and_is_idempotent() {
        let (mux, _far, _keep) = pipe(&ProtocolParams::default());
        let mut sub = mux.subscribe("x").unwrap();

        mux.shutdown();
        mux.shutdown();

        assert!(timeout(DEADLINE, sub.recv()).await.unwrap().unwrap_err().is_closed());
        assert!(
            timeout(DEADLINE, mux.next_general())
                .await
                .unwrap()
                .unwrap_err()
                .is_closed()
        );
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        use tokio::io::AsyncWriteExt;

        let (near, mut far) = tokio::io::duplex(4096);
        let mux = StreamMultiplexer::spawn(LineReader::new(near), &ProtocolParams::default());

        far.write_all(b"{not json}\n{\"type\":\"user\",\"content\":\"ok\"}\n")
            .await
            .unwrap();

        let got = timeout(DEADLINE, mux.next_general()).await.unwrap().unwrap();
        assert_eq!(got.content, "ok");
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_skipped() {
        use tokio::io::AsyncWriteExt;

        let (near, mut far) = tokio::io::duplex(4096);
        let mux = StreamMultiplexer::spawn(LineReader::new(near), &ProtocolParams::default());

        far.write_all(b"\xff\xfe garbage\n{\"type\":\"user\",\"content\":\"ok\"}\n")
            .await
            .unwrap();

        let got = timeout(DEADLINE, mux.next_general()).await.unwrap().unwrap();
        assert_eq!(got.content, "ok");
        assert!(!mux.is_shut_down());
    }
}
