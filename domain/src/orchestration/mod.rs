//! Consensus orchestration domain
//!
//! Phase state machine and the value objects a run produces.

pub mod phase;
pub mod value_objects;

pub use phase::Phase;
pub use value_objects::{AgentOutput, ConsensusResult, DebateContribution};
