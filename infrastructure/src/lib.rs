//! Infrastructure layer for triad
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: subprocess agents, configuration file
//! loading and event logging.

pub mod agents;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use agents::{CommandAgentExecutor, build_roster};
pub use config::{ConfigLoader, ConfigSource, FileAgentConfig, FileConfig};
pub use logging::JsonlEventLogger;
