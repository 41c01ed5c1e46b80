//! Application-level configuration.
//!
//! - [`EngineConfig`]: run loop control (concurrency, retries, budget, voting)

pub mod engine_config;

pub use engine_config::EngineConfig;
