//! Application configuration types.

pub mod protocol_params;

pub use protocol_params::{
    DEFAULT_GENERAL_QUEUE_CAPACITY, DEFAULT_STREAM_QUEUE_CAPACITY, ProtocolParams,
};
