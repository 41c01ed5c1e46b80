//! Read-only quorum snapshot

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};

/// Snapshot of a run's quorum bookkeeping
///
/// `alive` never grows: once an agent is listed in `excluded` it stays there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumState {
    /// Agents not excluded (`total_agents - excluded.len()`)
    pub alive: usize,
    /// Minimum number of agents required
    pub quorum: usize,
    /// Some, but not all, agents have produced a usable result
    pub partial_results: bool,
    pub retries_left: u32,
    /// Excluded agents in sorted order
    pub excluded: Vec<AgentId>,
}

impl QuorumState {
    /// Whether the run can still reach a valid decision
    pub fn is_quorate(&self) -> bool {
        self.alive >= self.quorum
    }
}
