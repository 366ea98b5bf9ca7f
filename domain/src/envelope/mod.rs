//! Envelope & type model
//!
//! - [`entities::Envelope`] — the unit of communication
//! - [`kind::EnvelopeKind`] — control kinds plus an open set of conversational kinds
//! - [`history::HistoryPolicy`] — the "may be replayed as history" predicate

pub mod entities;
pub mod history;
pub mod kind;
