//! Multiplexing and correlation on top of a transport.

pub mod connection;
pub mod correlator;
pub mod multiplexer;
