//! Which envelopes may be replayed into a new conversation as prior turns.

use super::entities::Envelope;
use super::kind::EnvelopeKind;
use std::collections::HashSet;

/// Kinds replayed as history when no configuration says otherwise.
pub const DEFAULT_SENDABLE_KINDS: [&str; 4] = ["user", "assistant", "system", "tool"];

/// Allow-list of history-sendable kinds.
///
/// Control kinds are rejected even if the allow-list names them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPolicy {
    sendable: HashSet<EnvelopeKind>,
}

impl HistoryPolicy {
    pub fn from_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sendable: kinds
                .into_iter()
                .map(|k| EnvelopeKind::conversation(k))
                .filter(|k| !k.is_control())
                .collect(),
        }
    }

    pub fn is_sendable(&self, kind: &EnvelopeKind) -> bool {
        !kind.is_control() && self.sendable.contains(kind)
    }

    /// Keep only history-sendable envelopes, preserving order.
    pub fn filter(&self, envelopes: Vec<Envelope>) -> Vec<Envelope> {
        envelopes
            .into_iter()
            .filter(|e| self.is_sendable(&e.kind))
            .collect()
    }
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self::from_kinds(DEFAULT_SENDABLE_KINDS)
    }
}
