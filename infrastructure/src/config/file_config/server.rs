//! WebSocket server configuration from TOML (`[server]` section)

use crate::transport::origin::OriginPolicy;
use serde::{Deserialize, Serialize};

/// Raw server configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    /// Address to listen on
    pub listen: String,
    /// Browser origins allowed to connect
    pub allowed_origins: Vec<String>,
    /// Accept every origin (explicit opt-in)
    pub allow_any_origin: bool,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
            allowed_origins: Vec::new(),
            allow_any_origin: false,
        }
    }
}

impl FileServerConfig {
    pub fn origin_policy(&self) -> OriginPolicy {
        if self.allow_any_origin {
            OriginPolicy::AllowAny
        } else {
            OriginPolicy::AllowList(self.allowed_origins.clone())
        }
    }
}
