//! Tool domain
//!
//! A [`ToolCall`](entities::ToolCall) goes out to the executor; a
//! [`ToolResult`](value_objects::ToolResult) comes back.

pub mod entities;
pub mod value_objects;
