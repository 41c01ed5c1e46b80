//! Votes and their aggregation into a final decision

use super::rule::VotePolicy;
use crate::agent::AgentId;
use serde::{Deserialize, Serialize};

/// A single agent's position in the VOTING phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteDecision {
    Approve,
    Reject,
    /// Approve, provided the attached conditions are met
    Conditional,
}

impl VoteDecision {
    /// Whether this vote counts towards approval
    pub fn is_in_favor(&self) -> bool {
        matches!(self, VoteDecision::Approve | VoteDecision::Conditional)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDecision::Approve => "APPROVE",
            VoteDecision::Reject => "REJECT",
            VoteDecision::Conditional => "CONDITIONAL",
        }
    }
}

/// A parsed vote from one agent
///
/// ```
/// use triad_domain::{AgentId, Vote, VoteDecision};
///
/// let vote = Vote::new(AgentId::Gemini, VoteDecision::Conditional, "Only with a rollback plan")
///     .with_conditions(vec!["Document the rollback".to_string()]);
/// assert!(vote.decision.is_in_favor());
/// assert_eq!(vote.conditions.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub agent: AgentId,
    pub decision: VoteDecision,
    pub reasoning: String,
    /// Confidence level (0.0 to 1.0, if stated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

impl Vote {
    pub fn new(agent: AgentId, decision: VoteDecision, reasoning: impl Into<String>) -> Self {
        Self {
            agent,
            decision,
            reasoning: reasoning.into(),
            confidence: None,
            conditions: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<String>) -> Self {
        self.conditions = conditions;
        self
    }
}

/// Outcome of a consensus run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalDecision {
    Approved,
    /// Approved, subject to the conditions attached to the result
    Conditional,
    Rejected,
    /// Neither side reached the threshold
    NoConsensus,
}

impl FinalDecision {
    /// Process exit code conventionally associated with this decision
    pub fn exit_code(&self) -> i32 {
        match self {
            FinalDecision::Approved => 0,
            FinalDecision::Rejected => 1,
            FinalDecision::NoConsensus => 2,
            FinalDecision::Conditional => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalDecision::Approved => "APPROVED",
            FinalDecision::Conditional => "CONDITIONAL",
            FinalDecision::Rejected => "REJECTED",
            FinalDecision::NoConsensus => "NO_CONSENSUS",
        }
    }
}

impl std::fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregated votes of the VOTING phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub approve_count: usize,
    pub conditional_count: usize,
    pub reject_count: usize,
    /// Votes actually cast
    pub cast: usize,
    /// Denominator the policy measured against
    pub total: usize,
    pub decision: FinalDecision,
    /// Conditions from conditional votes, deduplicated in vote order
    pub conditions: Vec<String>,
}

impl VoteTally {
    /// Aggregate votes under `policy`.
    ///
    /// `alive` is the number of non-excluded agents when voting completed and
    /// `roster` the number of agents the run started with.
    pub fn aggregate(votes: &[Vote], policy: &VotePolicy, alive: usize, roster: usize) -> Self {
        let approve_count = count(votes, VoteDecision::Approve);
        let conditional_count = count(votes, VoteDecision::Conditional);
        let reject_count = count(votes, VoteDecision::Reject);
        let cast = votes.len();
        let total = policy.total(cast, alive, roster);

        let mut conditions: Vec<String> = Vec::new();
        for vote in votes.iter().filter(|v| v.decision == VoteDecision::Conditional) {
            for condition in &vote.conditions {
                if !conditions.iter().any(|c| c.eq_ignore_ascii_case(condition)) {
                    conditions.push(condition.clone());
                }
            }
        }

        let decision = if policy.require_full_participation && cast < alive {
            FinalDecision::NoConsensus
        } else if policy
            .rule
            .is_satisfied(approve_count + conditional_count, total)
        {
            if conditional_count > 0 {
                FinalDecision::Conditional
            } else {
                FinalDecision::Approved
            }
        } else if policy.rule.is_satisfied(reject_count, total) {
            FinalDecision::Rejected
        } else {
            FinalDecision::NoConsensus
        };

        if decision != FinalDecision::Conditional {
            conditions.clear();
        }

        Self {
            approve_count,
            conditional_count,
            reject_count,
            cast,
            total,
            decision,
            conditions,
        }
    }

    /// Compact visual summary, e.g. `[●◐○]`
    pub fn vote_summary(votes: &[Vote]) -> String {
        let marks: String = votes
            .iter()
            .map(|v| match v.decision {
                VoteDecision::Approve => '●',
                VoteDecision::Conditional => '◐',
                VoteDecision::Reject => '○',
            })
            .collect();
        format!("[{}]", marks)
    }
}

fn count(votes: &[Vote], decision: VoteDecision) -> usize {
    votes.iter().filter(|v| v.decision == decision).count()
}
