//! Newline-delimited JSON over a byte stream.
//!
//! One envelope per line. Used for local executor processes (stdin/stdout)
//! and for anything else that only offers `AsyncRead`/`AsyncWrite`, such as
//! the [`ByteStreamAdapter`](super::byte_stream::ByteStreamAdapter).

use super::error::{Result, TransportError};
use super::{EnvelopeReader, EnvelopeWriter, decode_frame};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use toolwire_domain::Envelope;
use tracing::trace;

/// Read buffer size.
pub const DEFAULT_READ_CAPACITY: usize = 64 * 1024;

/// Longest line accepted before the line is discarded as malformed.
pub const DEFAULT_MAX_LINE: usize = 16 * 1024 * 1024;

/// How much of a rejected line is kept for the error report.
const RAW_EXCERPT: usize = 256;

/// Reads one envelope per line.
///
/// Lines are collected as bytes, so invalid UTF-8 and over-long lines are
/// reported as [`TransportError::Malformed`] and the next line still reads.
pub struct LineReader<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
    max_line: usize,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_READ_CAPACITY, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, inner),
            line: Vec::new(),
            max_line: DEFAULT_MAX_LINE,
        }
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line.max(1);
        self
    }

    /// Collect the next line into `self.line` without its terminator.
    ///
    /// Returns `Ok(None)` at end of input, `Ok(Some(overflow))` otherwise.
    /// Bytes past `max_line` are consumed but not kept.
    async fn next_line(&mut self) -> Result<Option<usize>> {
        self.line.clear();
        let mut overflow = 0;
        let mut seen_any = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(seen_any.then_some(overflow));
            }
            seen_any = true;

            let (body, used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            let room = self.max_line.saturating_sub(self.line.len());
            let keep = body.len().min(room);
            self.line.extend_from_slice(&body[..keep]);
            overflow += body.len() - keep;

            self.reader.consume(used);
            if done {
                return Ok(Some(overflow));
            }
        }
    }

    fn excerpt(&self) -> String {
        let end = self.line.len().min(RAW_EXCERPT);
        String::from_utf8_lossy(&self.line[..end]).into_owned()
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> EnvelopeReader for LineReader<R> {
    async fn read(&mut self) -> Result<Option<Envelope>> {
        loop {
            let Some(overflow) = self.next_line().await? else {
                return Ok(None);
            };

            if overflow > 0 {
                return Err(TransportError::Malformed {
                    error: format!(
                        "line of {} bytes exceeds the {} byte limit",
                        self.line.len() + overflow,
                        self.max_line
                    ),
                    raw: self.excerpt(),
                });
            }

            let text = match std::str::from_utf8(&self.line) {
                Ok(text) => text,
                Err(e) => {
                    return Err(TransportError::Malformed {
                        error: format!("invalid UTF-8: {}", e),
                        raw: self.excerpt(),
                    });
                }
            };

            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            return decode_frame(trimmed).map(Some);
        }
    }
}

/// Writes one envelope per line, flushing after each.
pub struct LineWriter<W> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> EnvelopeWriter for LineWriter<W> {
    async fn write(&mut self, envelope: &Envelope) -> Result<()> {
        let json = serde_json::to_string(envelope)?;
        trace!("Transport sending: {}", json);

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Split a byte-stream pair into a line transport.
pub fn line_transport<R, W>(reader: R, writer: W) -> (LineReader<R>, LineWriter<W>)
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    (LineReader::new(reader), LineWriter::new(writer))
}
