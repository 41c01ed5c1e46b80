//! Quorum bookkeeping and voting.
//!
//! ```text
//! THINKING ─┐
//! DEBATE   ─┼─ QuorumManager: note_success / exclude / decrement_retry
//! VOTING   ─┘        │
//!                    └─ can_continue() == false  →  run ends in ERROR
//! VOTING results ─ parse_vote ─ VoteTally::aggregate(VotePolicy) ─ FinalDecision
//! ```

pub mod manager;
pub mod parsing;
pub mod rule;
pub mod state;
pub mod vote;

pub use manager::QuorumManager;
pub use parsing::{parse_decision_keyword, parse_vote};
pub use rule::{QuorumRule, VoteDenominator, VotePolicy};
pub use state::QuorumState;
pub use vote::{FinalDecision, Vote, VoteDecision, VoteTally};
