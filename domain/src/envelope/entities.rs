//! The envelope — one discrete protocol message.

use super::kind::EnvelopeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key carrying the default working directory of a tool request.
pub const META_DEFAULT_WORKING_DIR: &str = "defaultWorkingDir";

/// Metadata key carrying the "tool handled the call" flag of a tool response.
pub const META_OK: &str = "ok";

/// One protocol message unit exchanged over a transport.
///
/// Empty strings mean "absent" and are skipped on the wire, so an
/// uncorrelated envelope simply has no `streamId` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Correlation key; empty means broadcast-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stream_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tool_name: String,
    /// Opaque payload, conventionally JSON text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Kind-specific structured extension.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            stream_id: String::new(),
            tool_name: String::new(),
            content: String::new(),
            error: String::new(),
            role: String::new(),
            metadata: Map::new(),
            timestamp: None,
        }
    }

    /// A `StreamEnd` envelope marking the end of a live exchange.
    pub fn stream_end() -> Self {
        Self::new(EnvelopeKind::StreamEnd)
    }

    /// An `Error` envelope reporting a connection-level failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::Error).with_error(message)
    }

    // ==================== Builder Methods ====================

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = stream_id.into();
        self
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    // ==================== Queries ====================

    /// Whether this envelope belongs to a correlated exchange.
    pub fn is_correlated(&self) -> bool {
        !self.stream_id.is_empty()
    }

    /// Boolean metadata value; `None` when absent or not a boolean.
    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    /// String metadata value; `None` when absent or not a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Stamp the envelope with the current time unless it already has one.
    ///
    /// Called at first transmission and at first observation; a second
    /// call never moves the timestamp.
    pub fn fill_timestamp(&mut self) {
        self.fill_timestamp_with(Utc::now());
    }

    pub fn fill_timestamp_with(&mut self, now: DateTime<Utc>) {
        if self.timestamp.is_none() {
            self.timestamp = Some(now);
        }
    }
}
