//! WebSocket transport: one JSON envelope per text frame.
//!
//! The socket is split once into a sink and a stream half so that the
//! multiplexer's reader task and the connection's writer never contend.

use super::byte_stream::ByteStreamAdapter;
use super::error::{Result, TransportError};
use super::origin::OriginPolicy;
use super::{EnvelopeReader, EnvelopeWriter, decode_frame};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use toolwire_domain::Envelope;
use tracing::{debug, trace, warn};

/// Inbound half of a WebSocket transport.
pub struct WebSocketReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Outbound half of a WebSocket transport.
pub struct WebSocketWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

/// Split an established WebSocket into reader and writer halves.
pub fn split<S>(socket: WebSocketStream<S>) -> (WebSocketReader<S>, WebSocketWriter<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = socket.split();
    (
        WebSocketReader { stream },
        WebSocketWriter {
            sink,
            closed: false,
        },
    )
}

/// Run the server side of the handshake on an accepted stream.
///
/// Handshakes whose `Origin` header is not admitted by `policy` are answered
/// with `403 Forbidden` and reported as an error.
pub async fn accept_websocket<S>(
    stream: S,
    policy: &OriginPolicy,
) -> Result<(WebSocketReader<S>, WebSocketWriter<S>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let check_origin = |request: &Request, response: Response| {
        let origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        if policy.allows(origin) {
            Ok(response)
        } else {
            warn!("WebSocket: rejecting handshake from origin {:?}", origin);
            let mut rejection = ErrorResponse::new(Some("origin not allowed".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    };

    let socket = tokio_tungstenite::accept_hdr_async(stream, check_origin).await?;
    debug!("WebSocket: handshake accepted");
    Ok(split(socket))
}

/// Open a client connection to `url` (`ws://` or `wss://`).
pub async fn connect_websocket(
    url: &str,
) -> Result<(
    WebSocketReader<MaybeTlsStream<TcpStream>>,
    WebSocketWriter<MaybeTlsStream<TcpStream>>,
)> {
    debug!("WebSocket: connecting to {}", url);
    let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(split(socket))
}

impl<S> WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Re-expose this reader as a newline-delimited byte stream.
    pub fn into_byte_stream(self, queue_capacity: usize) -> ByteStreamAdapter {
        ByteStreamAdapter::spawn(self, queue_capacity)
    }
}

#[async_trait]
impl<S> EnvelopeReader for WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self) -> Result<Option<Envelope>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_frame(&text).map(Some),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return decode_frame(&text).map(Some),
                    Err(e) => {
                        return Err(TransportError::Malformed {
                            error: e.to_string(),
                            raw: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                        });
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("WebSocket: peer closed ({:?})", frame);
                    return Ok(None);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    trace!("WebSocket: skipping control frame");
                }
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                    return Ok(None);
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl<S> EnvelopeWriter for WebSocketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, envelope: &Envelope) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let json = serde_json::to_string(envelope)?;
        trace!("WebSocket sending: {}", json);
        self.sink.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        match self.sink.send(Message::Close(Some(frame))).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
