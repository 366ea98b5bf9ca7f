//! Ports (interfaces) for the application layer
//!
//! Adapters implementing these live in the infrastructure layer.

pub mod envelope_channel;
pub mod exchange_logger;
pub mod tool_executor;
