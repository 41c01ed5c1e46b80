//! Orchestration value objects - immutable outputs of a consensus run.
//!
//! - [`AgentOutput`] - One agent's answer for one phase/round
//! - [`DebateContribution`] - A debate round entry
//! - [`ConsensusResult`] - Terminal artifact of a resolved run

use super::phase::Phase;
use crate::agent::AgentId;
use crate::context::ReductionLogEntry;
use crate::quorum::{FinalDecision, QuorumState, Vote, VoteTally};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of a single agent invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: AgentId,
    pub phase: Phase,
    pub round: u32,
    pub content: String,
}

impl AgentOutput {
    pub fn new(agent: AgentId, phase: Phase, round: u32, content: impl Into<String>) -> Self {
        Self {
            agent,
            phase,
            round,
            content: content.into(),
        }
    }

    /// Render as a phase result block for the next phase's context.
    ///
    /// The leading marker keeps the block a priority segment when the
    /// context has to be budgeted.
    pub fn as_context_block(&self) -> String {
        format!(
            "[{} RESULT {} round {}]\n{}",
            self.phase.as_str(),
            self.agent,
            self.round,
            self.content.trim()
        )
    }
}

/// One agent's contribution to a debate round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateContribution {
    pub agent: AgentId,
    pub round: u32,
    pub content: String,
}

impl From<AgentOutput> for DebateContribution {
    fn from(output: AgentOutput) -> Self {
        Self {
            agent: output.agent,
            round: output.round,
            content: output.content,
        }
    }
}

/// Terminal artifact of a resolved run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub prompt: String,
    /// THINKING output per agent that succeeded
    pub thinking: BTreeMap<AgentId, String>,
    /// Debate contributions ordered by round, then agent
    pub debate: Vec<DebateContribution>,
    /// Parsed votes ordered by agent
    pub votes: Vec<Vote>,
    pub tally: VoteTally,
    pub final_decision: FinalDecision,
    pub exit_code: i32,
    pub conditions: Vec<String>,
    /// Quorum bookkeeping when voting completed
    pub quorum: QuorumState,
    /// Every context reduction performed during the run
    pub budget_log: Vec<ReductionLogEntry>,
    /// Decided without every agent contributing
    pub partial: bool,
}

impl ConsensusResult {
    pub fn new(
        prompt: impl Into<String>,
        thinking: BTreeMap<AgentId, String>,
        mut debate: Vec<DebateContribution>,
        mut votes: Vec<Vote>,
        tally: VoteTally,
        quorum: QuorumState,
        budget_log: Vec<ReductionLogEntry>,
    ) -> Self {
        debate.sort_by_key(|c| (c.round, c.agent));
        votes.sort_by_key(|v| v.agent);
        let partial = quorum.partial_results || !quorum.excluded.is_empty();
        Self {
            prompt: prompt.into(),
            thinking,
            debate,
            votes,
            final_decision: tally.decision,
            exit_code: tally.decision.exit_code(),
            conditions: tally.conditions.clone(),
            tally,
            quorum,
            budget_log,
            partial,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(
            self.final_decision,
            FinalDecision::Approved | FinalDecision::Conditional
        )
    }

    pub fn vote_summary(&self) -> String {
        VoteTally::vote_summary(&self.votes)
    }

    /// Debate contributions of one round
    pub fn debate_round(&self, round: u32) -> impl Iterator<Item = &DebateContribution> {
        self.debate.iter().filter(move |c| c.round == round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::{VoteDecision, VotePolicy};

    fn state(excluded: Vec<AgentId>, partial_results: bool) -> QuorumState {
        QuorumState {
            alive: 3 - excluded.len(),
            quorum: 2,
            partial_results,
            retries_left: 0,
            excluded,
        }
    }

    #[test]
    fn test_result_orders_and_derives_fields() {
        let votes = vec![
            Vote::new(AgentId::Gemini, VoteDecision::Conditional, "ok if")
                .with_conditions(vec!["add tests".to_string()]),
            Vote::new(AgentId::Claude, VoteDecision::Approve, "fine"),
        ];
        let tally = VoteTally::aggregate(&votes, &VotePolicy::default(), 2, 3);
        let debate = vec![
            DebateContribution { agent: AgentId::Gemini, round: 1, content: "b".into() },
            DebateContribution { agent: AgentId::Claude, round: 2, content: "c".into() },
            DebateContribution { agent: AgentId::Claude, round: 1, content: "a".into() },
        ];
        let result = ConsensusResult::new(
            "ship?",
            BTreeMap::new(),
            debate,
            votes,
            tally,
            state(vec![AgentId::Codex], false),
            Vec::new(),
        );

        assert_eq!(result.final_decision, FinalDecision::Conditional);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.conditions, vec!["add tests"]);
        assert!(result.partial);
        assert!(result.is_approved());
        assert_eq!(result.votes[0].agent, AgentId::Claude);
        assert_eq!(
            result.debate.iter().map(|c| c.content.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(result.debate_round(1).count(), 2);
        assert_eq!(result.vote_summary(), "[●◐]");
    }

    #[test]
    fn test_context_block_marker() {
        let output = AgentOutput::new(AgentId::Codex, Phase::Thinking, 1, "  idea  ");
        assert_eq!(output.as_context_block(), "[THINKING RESULT codex round 1]\nidea");
    }

    #[test]
    fn test_result_json_shape() {
        let votes = vec![Vote::new(AgentId::Claude, VoteDecision::Approve, "fine")];
        let tally = VoteTally::aggregate(&votes, &VotePolicy::default(), 1, 1);
        let mut thinking = BTreeMap::new();
        thinking.insert(AgentId::Claude, "idea".to_string());
        let mut quorum = state(vec![], false);
        quorum.alive = 1;
        quorum.quorum = 1;
        let result = ConsensusResult::new("q", thinking, vec![], votes, tally, quorum, vec![]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["final_decision"], "APPROVED");
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["thinking"]["claude"], "idea");
        assert_eq!(json["partial"], false);
    }
}
