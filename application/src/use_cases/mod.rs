//! Use cases for the application layer

pub mod execute_tool;
pub mod load_initial_events;
