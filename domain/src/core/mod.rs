//! Core domain concepts shared across all subdomains.
//!
//! - [`error::ProtocolError`] — the error taxonomy returned to the orchestration loop

pub mod error;
