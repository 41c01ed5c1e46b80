//! Quorum and retry bookkeeping for a single run.
//!
//! Tracks which agents succeeded in the current phase, which are
//! permanently excluded, and how many retry credits remain. Only exclusion
//! shrinks the set of agents that can still contribute; a failed but
//! retryable agent stays alive.

use super::state::QuorumState;
use crate::agent::AgentId;
use crate::core::error::DomainError;
use std::collections::BTreeSet;

/// Run-scoped quorum manager
///
/// ```
/// use triad_domain::{AgentId, QuorumManager};
///
/// let mut quorum = QuorumManager::new(3, 2, 1).unwrap();
/// quorum.exclude(AgentId::Gemini);
/// assert_eq!(quorum.current_alive(), 2);
/// assert!(quorum.can_continue());
/// quorum.exclude(AgentId::Codex);
/// assert!(!quorum.can_continue());
/// ```
#[derive(Debug, Clone)]
pub struct QuorumManager {
    total_agents: usize,
    quorum: usize,
    retries_left: u32,
    successes: BTreeSet<AgentId>,
    excluded: BTreeSet<AgentId>,
}

impl QuorumManager {
    /// Create a manager for `total_agents` agents.
    ///
    /// Fails when `quorum` is zero or larger than `total_agents`.
    pub fn new(total_agents: usize, quorum: usize, max_retries: u32) -> Result<Self, DomainError> {
        if total_agents == 0 {
            return Err(DomainError::invalid_config("total_agents must be >= 1"));
        }
        if quorum == 0 || quorum > total_agents {
            return Err(DomainError::invalid_config(format!(
                "quorum must be between 1 and {} (got {})",
                total_agents, quorum
            )));
        }
        Ok(Self {
            total_agents,
            quorum,
            retries_left: max_retries,
            successes: BTreeSet::new(),
            excluded: BTreeSet::new(),
        })
    }

    /// Record a usable result. Idempotent; ignored for excluded agents.
    pub fn note_success(&mut self, agent: AgentId) {
        if !self.excluded.contains(&agent) {
            self.successes.insert(agent);
        }
    }

    /// Permanently remove an agent from the run. Idempotent.
    pub fn exclude(&mut self, agent: AgentId) {
        self.successes.remove(&agent);
        self.excluded.insert(agent);
    }

    /// Consume one retry credit, saturating at zero
    pub fn decrement_retry(&mut self) {
        self.retries_left = self.retries_left.saturating_sub(1);
    }

    /// Forget successes from the previous phase
    pub fn begin_phase(&mut self) {
        self.successes.clear();
    }

    pub fn is_excluded(&self, agent: AgentId) -> bool {
        self.excluded.contains(&agent)
    }

    pub fn has_succeeded(&self, agent: AgentId) -> bool {
        self.successes.contains(&agent)
    }

    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn total_agents(&self) -> usize {
        self.total_agents
    }

    /// `total_agents - |excluded|`
    pub fn current_alive(&self) -> usize {
        self.total_agents.saturating_sub(self.excluded.len())
    }

    /// False once quorum is structurally unreachable
    pub fn can_continue(&self) -> bool {
        self.current_alive() >= self.quorum
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn current_state(&self) -> QuorumState {
        let successes = self.successes.len();
        QuorumState {
            alive: self.current_alive(),
            quorum: self.quorum,
            partial_results: successes > 0 && successes < self.total_agents,
            retries_left: self.retries_left,
            excluded: self.excluded.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_scenario() {
        let mut quorum = QuorumManager::new(3, 2, 0).unwrap();
        quorum.exclude(AgentId::Claude);
        assert_eq!(quorum.current_alive(), 2);
        assert!(quorum.can_continue());

        quorum.exclude(AgentId::Codex);
        assert_eq!(quorum.current_alive(), 1);
        assert!(!quorum.can_continue());
    }

    #[test]
    fn test_exclude_is_idempotent_and_permanent() {
        let mut quorum = QuorumManager::new(3, 2, 1).unwrap();
        quorum.exclude(AgentId::Gemini);
        quorum.exclude(AgentId::Gemini);
        assert_eq!(quorum.current_alive(), 2);

        // Later success is irrelevant
        quorum.note_success(AgentId::Gemini);
        assert!(!quorum.has_succeeded(AgentId::Gemini));
        assert_eq!(quorum.current_alive(), 2);
        assert_eq!(quorum.current_state().excluded, vec![AgentId::Gemini]);
    }

    #[test]
    fn test_partial_results() {
        let mut quorum = QuorumManager::new(3, 2, 1).unwrap();
        assert!(!quorum.current_state().partial_results);

        quorum.note_success(AgentId::Claude);
        quorum.note_success(AgentId::Claude);
        assert_eq!(quorum.success_count(), 1);
        assert!(quorum.current_state().partial_results);

        quorum.note_success(AgentId::Codex);
        quorum.note_success(AgentId::Gemini);
        assert!(!quorum.current_state().partial_results);

        quorum.begin_phase();
        assert_eq!(quorum.success_count(), 0);
    }

    #[test]
    fn test_retry_credit_saturates() {
        let mut quorum = QuorumManager::new(3, 2, 1).unwrap();
        quorum.decrement_retry();
        assert_eq!(quorum.retries_left(), 0);
        quorum.decrement_retry();
        assert_eq!(quorum.retries_left(), 0);
    }

    #[test]
    fn test_excluded_list_is_sorted() {
        let mut quorum = QuorumManager::new(3, 1, 0).unwrap();
        quorum.exclude(AgentId::Gemini);
        quorum.exclude(AgentId::Claude);
        let state = quorum.current_state();
        assert_eq!(state.excluded, vec![AgentId::Claude, AgentId::Gemini]);
        assert!(state.is_quorate());
    }

    #[test]
    fn test_invalid_construction() {
        assert!(QuorumManager::new(0, 0, 0).is_err());
        assert!(QuorumManager::new(3, 0, 0).is_err());
        assert!(QuorumManager::new(3, 4, 0).is_err());
        assert!(QuorumManager::new(3, 3, 0).is_ok());
    }
}
