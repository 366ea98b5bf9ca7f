//! Protocol tuning from TOML (`[protocol]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolwire_application::ProtocolParams;
use toolwire_application::config::{DEFAULT_GENERAL_QUEUE_CAPACITY, DEFAULT_STREAM_QUEUE_CAPACITY};

/// Raw protocol configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProtocolConfig {
    /// Capacity of the general (broadcast) queue
    pub general_queue_capacity: usize,
    /// Capacity of each per-stream subscription queue
    pub stream_queue_capacity: usize,
    /// Deadline for one delegated tool call
    pub tool_timeout_seconds: u64,
    /// Deadline for the bootstrap handshake
    pub init_timeout_seconds: u64,
}

impl Default for FileProtocolConfig {
    fn default() -> Self {
        Self {
            general_queue_capacity: DEFAULT_GENERAL_QUEUE_CAPACITY,
            stream_queue_capacity: DEFAULT_STREAM_QUEUE_CAPACITY,
            tool_timeout_seconds: 300,
            init_timeout_seconds: 30,
        }
    }
}

impl FileProtocolConfig {
    pub fn to_params(&self) -> ProtocolParams {
        ProtocolParams::default()
            .with_general_queue_capacity(self.general_queue_capacity)
            .with_stream_queue_capacity(self.stream_queue_capacity)
            .with_tool_timeout(Duration::from_secs(self.tool_timeout_seconds))
            .with_init_timeout(Duration::from_secs(self.init_timeout_seconds))
    }
}
