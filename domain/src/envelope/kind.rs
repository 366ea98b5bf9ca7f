//! Envelope kinds.
//!
//! The protocol layer only interprets a handful of control kinds. Everything
//! else is a conversational kind (`user`, `assistant`, `tool`, ...) that is
//! carried through opaquely and only matters to the history policy.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// Kind of an [`Envelope`](super::entities::Envelope), serialized as the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeKind {
    /// Orchestrator → executor: run a tool.
    StreamRequestTool,
    /// Executor → orchestrator: terminal answer to a tool request.
    StreamResponseTool,
    /// Client → orchestrator: replace the working request.
    StreamInitRequest,
    /// Client → orchestrator: sentinel ending the bootstrap events.
    StreamInitEventsFinished,
    /// End of a live exchange.
    StreamEnd,
    /// Human-readable failure report.
    Error,
    /// Any other kind; opaque to the protocol layer.
    Conversation(String),
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeKind::StreamRequestTool => "stream_request_tool",
            EnvelopeKind::StreamResponseTool => "stream_response_tool",
            EnvelopeKind::StreamInitRequest => "stream_init_request",
            EnvelopeKind::StreamInitEventsFinished => "stream_init_events_finished",
            EnvelopeKind::StreamEnd => "stream_end",
            EnvelopeKind::Error => "error",
            EnvelopeKind::Conversation(name) => name,
        }
    }

    /// Control kinds drive the protocol itself and are never replayed as history.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            EnvelopeKind::StreamRequestTool
                | EnvelopeKind::StreamResponseTool
                | EnvelopeKind::StreamInitRequest
                | EnvelopeKind::StreamInitEventsFinished
        )
    }

    pub fn conversation(name: impl Into<String>) -> Self {
        EnvelopeKind::from(name.into())
    }
}

impl From<String> for EnvelopeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stream_request_tool" => EnvelopeKind::StreamRequestTool,
            "stream_response_tool" => EnvelopeKind::StreamResponseTool,
            "stream_init_request" => EnvelopeKind::StreamInitRequest,
            "stream_init_events_finished" => EnvelopeKind::StreamInitEventsFinished,
            "stream_end" => EnvelopeKind::StreamEnd,
            "error" => EnvelopeKind::Error,
            _ => EnvelopeKind::Conversation(value),
        }
    }
}

impl From<EnvelopeKind> for String {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Conversation(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for EnvelopeKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EnvelopeKind::from(s.to_string()))
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
