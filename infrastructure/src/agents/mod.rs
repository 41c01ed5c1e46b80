//! Agent executors
//!
//! [`CommandAgentExecutor`] runs each agent as a local CLI process;
//! [`build_roster`] turns the `[agents.*]` tables into the engine's roster.

mod command;

pub use command::{CommandAgentExecutor, classify_failure};

use crate::config::FileConfig;
use std::sync::Arc;
use triad_application::AgentExecutor;
use triad_domain::AgentId;

/// Executors for every enabled agent, in roster order
pub fn build_roster(config: &FileConfig) -> Vec<(AgentId, Arc<dyn AgentExecutor>)> {
    config
        .enabled_agents()
        .into_iter()
        .map(|(agent, file)| {
            let executor: Arc<dyn AgentExecutor> =
                Arc::new(CommandAgentExecutor::from_config(agent, file));
            (agent, executor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_skips_disabled_agents() {
        let mut config = FileConfig::default();
        config.agents.get_mut("claude").unwrap().enabled = false;
        let roster = build_roster(&config);
        let ids: Vec<AgentId> = roster.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![AgentId::Codex, AgentId::Gemini]);
    }
}
