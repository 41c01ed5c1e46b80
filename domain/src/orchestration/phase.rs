//! Phase of a consensus run

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Phase of a consensus run
///
/// ```text
/// QUEUED → THINKING → DEBATE → VOTING → RESOLVED
///    └──────────┴─────────┴────────┴──→ ERROR | CANCELLED
/// ```
///
/// `Queued` is only used by the session layer; the engine starts directly
/// in `Thinking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Queued,
    Thinking,
    Debate,
    Voting,
    Resolved,
    Error,
    Cancelled,
}

impl Phase {
    /// The working phases in execution order
    pub const WORKING: [Phase; 3] = [Phase::Thinking, Phase::Debate, Phase::Voting];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Queued => "QUEUED",
            Phase::Thinking => "THINKING",
            Phase::Debate => "DEBATE",
            Phase::Voting => "VOTING",
            Phase::Resolved => "RESOLVED",
            Phase::Error => "ERROR",
            Phase::Cancelled => "CANCELLED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::Queued => "Queued",
            Phase::Thinking => "Thinking",
            Phase::Debate => "Debate",
            Phase::Voting => "Voting",
            Phase::Resolved => "Resolved",
            Phase::Error => "Error",
            Phase::Cancelled => "Cancelled",
        }
    }

    /// Position in the forward chain (terminal failure states have none)
    fn ordinal(&self) -> Option<u8> {
        match self {
            Phase::Queued => Some(0),
            Phase::Thinking => Some(1),
            Phase::Debate => Some(2),
            Phase::Voting => Some(3),
            Phase::Resolved => Some(4),
            Phase::Error | Phase::Cancelled => None,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Resolved | Phase::Error | Phase::Cancelled)
    }

    /// Whether agents are invoked in this phase
    pub fn is_working(&self) -> bool {
        matches!(self, Phase::Thinking | Phase::Debate | Phase::Voting)
    }

    /// Check whether `self → next` is a legal transition.
    ///
    /// Transitions are strictly forward by one step, except `Error` and
    /// `Cancelled` which are reachable from every non-terminal phase.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Phase::Error | Phase::Cancelled) {
            return true;
        }
        match (self.ordinal(), next.ordinal()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }

    /// Validate and perform a transition
    pub fn transition(self, next: Phase) -> Result<Phase, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.as_str().to_lowercase(),
                to: next.as_str().to_lowercase(),
            })
        }
    }

    /// The phase that follows a successful working phase
    pub fn next_working(&self) -> Option<Phase> {
        match self {
            Phase::Queued => Some(Phase::Thinking),
            Phase::Thinking => Some(Phase::Debate),
            Phase::Debate => Some(Phase::Voting),
            Phase::Voting => Some(Phase::Resolved),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain() {
        let mut phase = Phase::Queued;
        for next in [
            Phase::Thinking,
            Phase::Debate,
            Phase::Voting,
            Phase::Resolved,
        ] {
            phase = phase.transition(next).unwrap();
        }
        assert_eq!(phase, Phase::Resolved);
        assert!(phase.is_terminal());
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!Phase::Thinking.can_transition_to(Phase::Voting));
        assert!(!Phase::Voting.can_transition_to(Phase::Thinking));
        assert!(!Phase::Debate.can_transition_to(Phase::Debate));
    }

    #[test]
    fn test_error_and_cancel_from_any_non_terminal() {
        for phase in [Phase::Queued, Phase::Thinking, Phase::Debate, Phase::Voting] {
            assert!(phase.can_transition_to(Phase::Error));
            assert!(phase.can_transition_to(Phase::Cancelled));
        }
    }

    #[test]
    fn test_terminal_phases_are_final() {
        for phase in [Phase::Resolved, Phase::Error, Phase::Cancelled] {
            assert!(!phase.can_transition_to(Phase::Error));
            assert!(!phase.can_transition_to(Phase::Cancelled));
            assert!(phase.next_working().is_none());
        }
        let err = Phase::Cancelled.transition(Phase::Thinking).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn test_serde_uses_upper_case() {
        assert_eq!(
            serde_json::to_string(&Phase::Thinking).unwrap(),
            "\"THINKING\""
        );
        let phase: Phase = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(phase, Phase::Cancelled);
    }

    #[test]
    fn test_working_phases() {
        assert!(Phase::WORKING.iter().all(|p| p.is_working()));
        assert!(!Phase::Queued.is_working());
        assert!(!Phase::Resolved.is_working());
    }
}
