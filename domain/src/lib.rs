//! Domain layer for triad
//!
//! Pure types and algorithms of a three-agent consensus run. Nothing in
//! this crate performs I/O or spawns tasks.
//!
//! # Core Concepts
//!
//! ## Phases
//!
//! A run moves through THINKING → DEBATE → VOTING and ends in RESOLVED,
//! ERROR or CANCELLED ([`Phase`]).
//!
//! ## Quorum
//!
//! [`QuorumManager`] tracks successes, exclusions and retry credits; a run
//! can only continue while enough agents remain alive. Votes are parsed
//! ([`quorum::parse_vote`]) and aggregated under a [`VotePolicy`].
//!
//! ## Context budget
//!
//! [`TokenBudgetManager`] reduces the text carried between phases to a
//! fixed token budget, preferring marked and summary segments.

pub mod agent;
pub mod config;
pub mod context;
pub mod core;
pub mod event;
pub mod orchestration;
pub mod prompt;
pub mod quorum;
pub mod util;

// Re-export commonly used types
pub use agent::AgentId;
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use context::{ReductionLogEntry, ReductionStrategy, TokenBudgetManager, TokenBudgetResult};
pub use core::{error::DomainError, question::Question};
pub use event::EngineEvent;
pub use orchestration::{AgentOutput, ConsensusResult, DebateContribution, Phase};
pub use prompt::{PhasePromptTemplate, PhasePrompts, persona_system_prompt};
pub use quorum::{
    FinalDecision, QuorumManager, QuorumRule, QuorumState, Vote, VoteDecision, VoteDenominator,
    VotePolicy, VoteTally,
};
