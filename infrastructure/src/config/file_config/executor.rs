//! Local executor configuration from TOML (`[executor]` section)

use serde::{Deserialize, Serialize};

/// Raw executor configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutorConfig {
    /// Program speaking newline-delimited envelopes on stdio
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Working directory for the process; also sent as `defaultWorkingDir`
    pub working_dir: Option<String>,
}
