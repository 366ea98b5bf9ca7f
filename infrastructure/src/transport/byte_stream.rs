//! Re-expose any envelope reader as a newline-delimited byte stream.
//!
//! A pump task pulls envelopes from the wrapped reader into a bounded queue;
//! each `poll_read` hands out exactly one envelope as a newline-terminated
//! JSON line. If the caller's buffer cannot hold the whole line the read
//! fails with [`TransportError::Capacity`] and the line stays pending, so a
//! retry with a larger buffer loses nothing.

use super::EnvelopeReader;
use super::error::TransportError;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use toolwire_domain::Envelope;
use tracing::{debug, warn};

pub struct ByteStreamAdapter {
    rx: mpsc::Receiver<Envelope>,
    pending: Option<Vec<u8>>,
    pump: Option<JoinHandle<()>>,
}

impl ByteStreamAdapter {
    /// Start pumping `reader` into a queue of `queue_capacity` envelopes.
    pub fn spawn<R>(mut reader: R, queue_capacity: usize) -> Self
    where
        R: EnvelopeReader + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let pump = tokio::spawn(async move {
            loop {
                match reader.read().await {
                    Ok(Some(envelope)) => {
                        if tx.send(envelope).await.is_err() {
                            debug!("ByteStream: consumer gone, stopping pump");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(TransportError::Malformed { error, raw }) => {
                        warn!("ByteStream: dropping malformed frame: {} ({})", error, raw);
                    }
                    Err(e) => {
                        warn!("ByteStream: source failed: {}", e);
                        break;
                    }
                }
            }
        });
        Self {
            rx,
            pending: None,
            pump: Some(pump),
        }
    }

    /// Serve envelopes pushed by some other producer.
    pub fn from_receiver(rx: mpsc::Receiver<Envelope>) -> Self {
        Self {
            rx,
            pending: None,
            pump: None,
        }
    }
}

impl AsyncRead for ByteStreamAdapter {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        let line = match this.pending.take() {
            Some(line) => line,
            None => match ready!(this.rx.poll_recv(cx)) {
                Some(envelope) => {
                    let mut line = serde_json::to_vec(&envelope).map_err(io::Error::other)?;
                    line.push(b'\n');
                    line
                }
                // Zero bytes filled signals EOF.
                None => return Poll::Ready(Ok(())),
            },
        };

        if line.len() > buf.remaining() {
            let error = TransportError::Capacity {
                needed: line.len(),
                available: buf.remaining(),
            };
            this.pending = Some(line);
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::InvalidInput, error)));
        }

        buf.put_slice(&line);
        Poll::Ready(Ok(()))
    }
}

impl Drop for ByteStreamAdapter {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::lines::LineReader;
    use tokio::io::AsyncReadExt;
    use toolwire_domain::EnvelopeKind;

    #[tokio::test]
    async fn each_read_yields_one_newline_terminated_envelope() {
        let (tx, rx) = mpsc::channel(4);
        let mut adapter = ByteStreamAdapter::from_receiver(rx);

        tx.send(Envelope::new(EnvelopeKind::conversation("user")).with_content("a"))
            .await
            .unwrap();
        tx.send(Envelope::stream_end()).await.unwrap();
        drop(tx);

        let mut buf = vec![0u8; 1024];
        let n = adapter.read(&mut buf).await.unwrap();
        let first = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(first.ends_with('\n'));
        assert_eq!(first.matches('\n').count(), 1);
        assert!(first.contains(r#""content":"a""#));

        let n = adapter.read(&mut buf).await.unwrap();
        assert!(std::str::from_utf8(&buf[..n]).unwrap().contains("stream_end"));

        assert_eq!(adapter.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn small_buffer_fails_without_losing_the_envelope() {
        let (tx, rx) = mpsc::channel(1);
        let mut adapter = ByteStreamAdapter::from_receiver(rx);
        tx.send(Envelope::new(EnvelopeKind::conversation("assistant")).with_content("x".repeat(64)))
            .await
            .unwrap();

        let mut tiny = [0u8; 8];
        let err = adapter.read(&mut tiny).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("too small"));

        let mut roomy = vec![0u8; 4096];
        let n = adapter.read(&mut roomy).await.unwrap();
        assert!(std::str::from_utf8(&roomy[..n]).unwrap().contains(&"x".repeat(64)));
    }

    #[tokio::test]
    async fn line_reader_consumes_adapter_output() {
        let (tx, rx) = mpsc::channel(4);
        let adapter = ByteStreamAdapter::from_receiver(rx);
        let mut reader = LineReader::new(adapter);

        let sent = Envelope::new(EnvelopeKind::StreamResponseTool)
            .with_stream_id("call-9")
            .with_content(r#"{"n":1}"#);
        tx.send(sent.clone()).await.unwrap();
        drop(tx);

        assert_eq!(reader.read().await.unwrap(), Some(sent));
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pump_skips_malformed_frames() {
        let source: &[u8] = b"garbage\n{\"type\":\"stream_end\"}\n";
        let adapter = ByteStreamAdapter::spawn(LineReader::new(source), 4);
        let mut reader = LineReader::new(adapter);

        let envelope = reader.read().await.unwrap().unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::StreamEnd);
        assert!(reader.read().await.unwrap().is_none());
    }
}
