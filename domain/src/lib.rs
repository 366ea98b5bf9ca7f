//! Domain layer for toolwire
//!
//! This crate contains the protocol's message model and value types.
//! It has no dependencies on I/O, runtimes or transports.
//!
//! # Core Concepts
//!
//! ## Envelope
//!
//! Every message on the wire is an [`Envelope`]. Its `streamId` correlates a
//! tool request with its terminal response; an empty `streamId` marks a
//! broadcast-only message.
//!
//! ## Tool delegation
//!
//! The orchestrator turns a [`ToolCall`] into a `stream_request_tool`
//! envelope and receives a [`ToolResult`] decoded from the matching
//! `stream_response_tool`.

pub mod core;
pub mod envelope;
pub mod request;
pub mod tool;

// Re-export commonly used types
pub use crate::core::error::{ProtocolError, Result};
pub use envelope::{
    entities::{Envelope, META_DEFAULT_WORKING_DIR, META_OK},
    history::{DEFAULT_SENDABLE_KINDS, HistoryPolicy},
    kind::EnvelopeKind,
};
pub use request::entities::ConversationRequest;
pub use tool::{entities::ToolCall, value_objects::ToolResult};
