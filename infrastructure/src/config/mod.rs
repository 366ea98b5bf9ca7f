//! Configuration file loading for toolwire
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `TOOLWIRE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./toolwire.toml` or `./.toolwire.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/toolwire/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileExecutorConfig, FileHistoryConfig, FileLoggingConfig,
    FileProtocolConfig, FileServerConfig,
};
pub use loader::ConfigLoader;
