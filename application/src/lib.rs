//! Application layer for triad
//!
//! Use cases, the agent port, and the runtime services a consensus run
//! shares: the concurrency controller and the event broadcaster.
//! It depends only on the domain layer.

pub mod broadcaster;
pub mod concurrency;
pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use broadcaster::{BroadcastError, EventBroadcaster, SCHEMA_VERSION, SubscriberQueue};
pub use concurrency::{ConcurrencyController, ConcurrencyError, ConcurrencyMetrics, ConcurrencySlot};
pub use config::EngineConfig;
pub use ports::{AgentChunk, AgentError, AgentExecutor, AgentRequest, AgentStream};
pub use use_cases::{
    ConsensusEngine, ConsensusError, EventStream, SessionManager, SessionStatus,
};
