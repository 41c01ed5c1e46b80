//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod agent_executor;

pub use agent_executor::{AgentChunk, AgentError, AgentExecutor, AgentRequest, AgentStream};
