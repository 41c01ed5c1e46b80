//! Engine parameters for the run loop.
//!
//! [`EngineConfig`] groups the static parameters a
//! [`ConsensusEngine`](crate::use_cases::run_consensus::ConsensusEngine) is
//! built with. Every run started from one engine uses the same values.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use triad_domain::{DomainError, VotePolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum simultaneous agent calls
    pub max_concurrent: usize,
    /// How long an agent task waits for a concurrency slot
    pub acquire_timeout: Option<Duration>,
    /// Upper bound for a single agent call
    pub agent_timeout: Option<Duration>,
    /// Retry credits shared by the whole run
    pub max_retries: u32,
    /// Minimum number of live agents
    pub quorum: usize,
    /// Token budget for context carried between phases
    pub max_tokens: usize,
    pub tokens_per_char: f64,
    /// Debate rounds; 0 passes through DEBATE without calling agents
    pub debate_rounds: u32,
    pub vote_policy: VotePolicy,
    /// Capacity of the run's event channel
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            acquire_timeout: Some(Duration::from_secs(30)),
            agent_timeout: Some(Duration::from_secs(300)),
            max_retries: 2,
            quorum: 2,
            max_tokens: 6_000,
            tokens_per_char: 0.25,
            debate_rounds: 1,
            vote_policy: VotePolicy::default(),
            event_buffer: 64,
        }
    }
}

impl EngineConfig {
    /// Check limits that would make an engine unusable
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_concurrent == 0 {
            return Err(DomainError::invalid_config("max_concurrent must be >= 1"));
        }
        if self.quorum == 0 {
            return Err(DomainError::invalid_config("quorum must be >= 1"));
        }
        if self.max_tokens == 0 {
            return Err(DomainError::invalid_config("max_tokens must be >= 1"));
        }
        if !self.tokens_per_char.is_finite() || self.tokens_per_char <= 0.0 {
            return Err(DomainError::invalid_config(
                "tokens_per_char must be a positive number",
            ));
        }
        if self.event_buffer == 0 {
            return Err(DomainError::invalid_config("event_buffer must be >= 1"));
        }
        Ok(())
    }

    // ==================== Builder Methods ====================

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_budget(mut self, max_tokens: usize, tokens_per_char: f64) -> Self {
        self.max_tokens = max_tokens;
        self.tokens_per_char = tokens_per_char;
        self
    }

    pub fn with_debate_rounds(mut self, rounds: u32) -> Self {
        self.debate_rounds = rounds;
        self
    }

    pub fn with_vote_policy(mut self, policy: VotePolicy) -> Self {
        self.vote_policy = policy;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triad_domain::QuorumRule;

    #[test]
    fn test_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.quorum, 2);
        assert_eq!(config.debate_rounds, 1);
        assert_eq!(config.vote_policy.rule, QuorumRule::Majority);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_max_concurrent(1)
            .with_max_retries(0)
            .with_budget(500, 1.0)
            .with_debate_rounds(2)
            .with_agent_timeout(None);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.debate_rounds, 2);
        assert!(config.agent_timeout.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(EngineConfig::default().with_max_concurrent(0).validate().is_err());
        assert!(EngineConfig::default().with_quorum(0).validate().is_err());
        assert!(EngineConfig::default().with_budget(0, 1.0).validate().is_err());
        assert!(EngineConfig::default().with_budget(10, 0.0).validate().is_err());
        assert!(EngineConfig::default().with_event_buffer(0).validate().is_err());
    }
}
