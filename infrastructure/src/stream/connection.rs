//! One live connection: a transport plus its multiplexer.
//!
//! [`Connection`] owns the writer half behind an async mutex (the
//! single-writer convention) and the [`StreamMultiplexer`] that owns the
//! reader half. It implements [`EnvelopeChannel`], so use cases run against
//! it without knowing which transport is underneath.
//!
//! A write abandoned part way (its future dropped, e.g. by a correlator
//! deadline) leaves a partial frame on the wire. The connection is then
//! marked broken and shut down, so later writes fail with
//! `TransportClosed` instead of appending to the fragment.

use super::correlator;
use super::multiplexer::{StreamMultiplexer, Subscription};
use crate::transport::error::TransportError;
use crate::transport::process::{ExecutorProcess, spawn_executor};
use crate::transport::{EnvelopeReader, EnvelopeWriter};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;
use toolwire_application::{EnvelopeChannel, ProtocolParams};
use toolwire_domain::{Envelope, EnvelopeKind, ProtocolError};
use tracing::{debug, warn};

pub struct Connection {
    /// Writer (serialized writes, independent of reader).
    writer: Mutex<Box<dyn EnvelopeWriter>>,
    /// Set when a write was cancelled mid-frame.
    writer_broken: AtomicBool,
    multiplexer: StreamMultiplexer,
    /// Executor child process, if this connection spawned one.
    child: Option<Child>,
}

impl Connection {
    pub fn new<R, W>(reader: R, writer: W, params: &ProtocolParams) -> Self
    where
        R: EnvelopeReader + 'static,
        W: EnvelopeWriter + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            writer_broken: AtomicBool::new(false),
            multiplexer: StreamMultiplexer::spawn(reader, params),
            child: None,
        }
    }

    /// Spawn a local executor and connect to it over its stdio.
    pub fn spawn_executor(
        command: &str,
        args: &[String],
        working_dir: Option<&Path>,
        params: &ProtocolParams,
    ) -> Result<Self, TransportError> {
        let ExecutorProcess {
            reader,
            writer,
            child,
        } = spawn_executor(command, args, working_dir)?;
        let mut connection = Self::new(reader, writer, params);
        connection.child = Some(child);
        Ok(connection)
    }

    pub fn multiplexer(&self) -> &StreamMultiplexer {
        &self.multiplexer
    }

    pub fn subscribe(&self, stream_id: &str) -> Result<Subscription, ProtocolError> {
        self.multiplexer.subscribe(stream_id)
    }

    pub fn unsubscribe(&self, stream_id: &str) -> bool {
        self.multiplexer.unsubscribe(stream_id)
    }

    /// Write one envelope, stamping its timestamp if unset.
    pub async fn emit(&self, mut envelope: Envelope) -> Result<(), ProtocolError> {
        if self.multiplexer.is_shut_down() {
            return Err(ProtocolError::TransportClosed);
        }
        envelope.fill_timestamp();
        let mut writer = self.writer.lock().await;
        if self.is_writer_broken() {
            return Err(ProtocolError::TransportClosed);
        }

        let in_flight = WriteInFlight::start(self);
        let result = writer.write(&envelope).await;
        in_flight.finish();
        result.map_err(Into::into)
    }

    /// Send `stream_end` and close the writer.
    ///
    /// Holding the writer lock orders the marker after every emit that was
    /// already in flight.
    pub async fn end_stream(&self) -> Result<(), ProtocolError> {
        let mut envelope = Envelope::stream_end();
        envelope.fill_timestamp();

        let mut writer = self.writer.lock().await;
        if self.is_writer_broken() {
            return Err(ProtocolError::TransportClosed);
        }

        let in_flight = WriteInFlight::start(self);
        let result = writer.write(&envelope).await;
        in_flight.finish();
        result?;
        writer.close().await?;
        debug!("Connection: stream ended");
        Ok(())
    }

    /// Report a failure to the far side; a failed write is only logged.
    pub async fn send_error_best_effort(&self, message: &str) {
        if let Err(e) = self.emit(Envelope::failure(message)).await {
            warn!("Connection: could not deliver error envelope: {}", e);
        }
    }

    /// Stop the multiplexer and release every waiter. Idempotent.
    pub fn shutdown(&self) {
        self.multiplexer.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.multiplexer.is_shut_down()
    }

    fn is_writer_broken(&self) -> bool {
        self.writer_broken.load(Ordering::Acquire)
    }
}

/// Marks the connection broken unless [`finish`](Self::finish) is reached.
struct WriteInFlight<'a> {
    connection: &'a Connection,
    finished: bool,
}

impl<'a> WriteInFlight<'a> {
    fn start(connection: &'a Connection) -> Self {
        Self {
            connection,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for WriteInFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("Connection: write cancelled mid-frame, closing connection");
        self.connection.writer_broken.store(true, Ordering::Release);
        self.connection.multiplexer.shutdown();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.multiplexer.shutdown();
        if let Some(child) = self.child.as_mut() {
            debug!("Connection dropping, killing executor child process");
            let _ = child.start_kill();
        }
    }
}

#[async_trait]
impl EnvelopeChannel for Connection {
    async fn correlated_request(
        &self,
        outbound: Envelope,
        expected: EnvelopeKind,
        deadline: Duration,
    ) -> Result<Envelope, ProtocolError> {
        correlator::correlated_request(&self.multiplexer, outbound, &expected, deadline, |env| {
            self.emit(env)
        })
        .await
    }

    async fn next_general(&self) -> Result<Envelope, ProtocolError> {
        self.multiplexer.next_general().await
    }

    async fn emit(&self, envelope: Envelope) -> Result<(), ProtocolError> {
        Connection::emit(self, envelope).await
    }
}
