//! Protocol parameters — queue sizing and deadlines.
//!
//! [`ProtocolParams`] groups the static values that control one connection:
//! how much the multiplexer may buffer before it applies backpressure, and
//! how long the correlated waits may take.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capacity of the general (broadcast) queue.
pub const DEFAULT_GENERAL_QUEUE_CAPACITY: usize = 100;

/// Capacity of each per-stream subscriber queue.
pub const DEFAULT_STREAM_QUEUE_CAPACITY: usize = 10;

/// Connection-level protocol parameters.
///
/// | Field | Used by |
/// |-------|---------|
/// | `general_queue_capacity` | Multiplexer read loop |
/// | `stream_queue_capacity` | `subscribe` |
/// | `tool_timeout` | Tool execution bridge |
/// | `init_timeout` | Bootstrap handshake |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    pub general_queue_capacity: usize,
    pub stream_queue_capacity: usize,
    pub tool_timeout: Duration,
    pub init_timeout: Duration,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            general_queue_capacity: DEFAULT_GENERAL_QUEUE_CAPACITY,
            stream_queue_capacity: DEFAULT_STREAM_QUEUE_CAPACITY,
            tool_timeout: Duration::from_secs(300),
            init_timeout: Duration::from_secs(30),
        }
    }
}

impl ProtocolParams {
    // ==================== Builder Methods ====================

    pub fn with_general_queue_capacity(mut self, capacity: usize) -> Self {
        self.general_queue_capacity = capacity;
        self
    }

    pub fn with_stream_queue_capacity(mut self, capacity: usize) -> Self {
        self.stream_queue_capacity = capacity;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }
}
