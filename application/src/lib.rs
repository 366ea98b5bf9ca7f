//! Application layer for toolwire
//!
//! This crate contains use cases, port definitions, and protocol parameters.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ProtocolParams;
pub use ports::{
    envelope_channel::EnvelopeChannel,
    exchange_logger::{ExchangeEvent, ExchangeLogger, NoExchangeLogger},
    tool_executor::ToolExecutorPort,
};
pub use use_cases::execute_tool::{ExecuteToolUseCase, build_tool_request, decode_tool_response};
pub use use_cases::load_initial_events::LoadInitialEventsUseCase;
