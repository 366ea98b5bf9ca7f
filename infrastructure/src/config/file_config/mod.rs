//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted to application types on
//! demand.

mod executor;
mod history;
mod logging;
mod protocol;
mod server;

pub use executor::FileExecutorConfig;
pub use history::FileHistoryConfig;
pub use logging::FileLoggingConfig;
pub use protocol::FileProtocolConfig;
pub use server::FileServerConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("protocol.{0} cannot be 0")]
    ZeroCapacity(&'static str),

    #[error("protocol.{0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("server.listen cannot be empty")]
    EmptyListenAddress,

    #[error("executor.command cannot be empty")]
    EmptyExecutorCommand,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Queue capacities and deadlines
    pub protocol: FileProtocolConfig,
    /// Which initial events are replayed as history
    pub history: FileHistoryConfig,
    /// WebSocket listener
    pub server: FileServerConfig,
    /// Local executor process
    pub executor: FileExecutorConfig,
    /// Exchange transcript
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the configuration, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let protocol = &self.protocol;
        if protocol.general_queue_capacity == 0 {
            return Err(ConfigValidationError::ZeroCapacity("general_queue_capacity"));
        }
        if protocol.stream_queue_capacity == 0 {
            return Err(ConfigValidationError::ZeroCapacity("stream_queue_capacity"));
        }
        if protocol.tool_timeout_seconds == 0 {
            return Err(ConfigValidationError::ZeroTimeout("tool_timeout_seconds"));
        }
        if protocol.init_timeout_seconds == 0 {
            return Err(ConfigValidationError::ZeroTimeout("init_timeout_seconds"));
        }
        if self.server.listen.trim().is_empty() {
            return Err(ConfigValidationError::EmptyListenAddress);
        }
        if self
            .executor
            .command
            .as_deref()
            .is_some_and(|command| command.trim().is_empty())
        {
            return Err(ConfigValidationError::EmptyExecutorCommand);
        }
        Ok(())
    }
}
