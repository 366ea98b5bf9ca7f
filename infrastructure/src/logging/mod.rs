//! Logging infrastructure — structured exchange transcripts.
//!
//! Provides [`JsonlExchangeLogger`], a JSONL file writer that implements
//! the [`ExchangeLogger`](toolwire_application::ExchangeLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlExchangeLogger;
