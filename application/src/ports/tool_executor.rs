//! Tool Executor port
//!
//! Defines the interface the orchestration loop uses to run a tool call.

use async_trait::async_trait;
use toolwire_domain::{ProtocolError, ToolCall, ToolResult};

/// Port for tool execution
///
/// A declined call comes back as `Ok` with [`ToolResult::is_declined`];
/// only protocol failures (validation, timeout, closed transport) are `Err`.
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// Execute a tool call asynchronously
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ProtocolError>;
}
