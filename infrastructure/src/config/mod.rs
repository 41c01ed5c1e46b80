//! Configuration file loading for triad
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./triad.toml` or `./.triad.toml`
//! 3. Global: `$XDG_CONFIG_HOME/triad/config.toml` (or the platform equivalent)
//! 4. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileAgentConfig, FileBroadcastConfig, FileBudgetConfig, FileConfig, FileEngineConfig,
    FileLoggingConfig, FileQuorumConfig,
};
pub use loader::{ConfigLoader, ConfigSource};
