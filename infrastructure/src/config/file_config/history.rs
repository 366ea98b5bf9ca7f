//! History replay configuration from TOML (`[history]` section)

use serde::{Deserialize, Serialize};
use toolwire_domain::{DEFAULT_SENDABLE_KINDS, HistoryPolicy};

/// Raw history configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHistoryConfig {
    /// Envelope kinds that may be replayed as prior conversation turns.
    /// Control kinds are ignored even if listed.
    pub sendable_kinds: Vec<String>,
}

impl Default for FileHistoryConfig {
    fn default() -> Self {
        Self {
            sendable_kinds: DEFAULT_SENDABLE_KINDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl FileHistoryConfig {
    pub fn policy(&self) -> HistoryPolicy {
        HistoryPolicy::from_kinds(&self.sendable_kinds)
    }
}
