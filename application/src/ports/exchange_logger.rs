//! Port for structured exchange logging.
//!
//! Defines the [`ExchangeLogger`] trait for recording protocol exchanges
//! (tool requests, tool responses, bootstrap events) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures a
//! machine-readable transcript (JSONL).

use serde_json::Value;

/// A structured exchange event for logging.
pub struct ExchangeEvent {
    /// Event type identifier (e.g., "tool_request", "tool_response", "init_finished").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ExchangeEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging exchange events.
///
/// The `log` method is synchronous and non-fallible so that a broken
/// transcript never disturbs the exchange itself.
pub trait ExchangeLogger: Send + Sync {
    /// Record an exchange event.
    fn log(&self, event: ExchangeEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoExchangeLogger;

impl ExchangeLogger for NoExchangeLogger {
    fn log(&self, _event: ExchangeEvent) {}
}
