//! Raw TOML configuration data types
//!
//! These structs mirror the config file exactly and are deserialized
//! directly. Conversion into engine types happens in [`FileConfig`]'s
//! helpers, and [`FileConfig::validate`] reports every problem at once.
//!
//! ```toml
//! [engine]
//! max_concurrent = 3
//! acquire_timeout_secs = 30   # 0 waits forever
//! agent_timeout_secs = 300    # 0 disables the per-call limit
//! debate_rounds = 1           # 0 skips debate: agents vote on THINKING output
//! event_buffer = 64
//!
//! [quorum]
//! quorum = 2
//! max_retries = 2
//! rule = "majority"           # or "unanimous", "atleast:N", "N%"
//! denominator = "alive"       # or "cast", "roster"
//! require_full_participation = false
//!
//! [budget]
//! max_tokens = 6000
//! tokens_per_char = 0.25
//!
//! [broadcast]
//! queue_maxsize = 256
//!
//! [agents.codex]
//! command = "codex"
//! args = ["exec", "-"]
//!
//! [logging]
//! dir = "~/.local/state/triad/logs"
//! event_log = "events.jsonl"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use triad_application::EngineConfig;
use triad_domain::{
    AgentId, ConfigIssue, ConfigIssueCode, DomainError, QuorumRule, VoteDenominator, VotePolicy,
};

/// `[engine]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    pub max_concurrent: usize,
    /// Seconds to wait for a concurrency slot (0 = no limit)
    pub acquire_timeout_secs: u64,
    /// Seconds one agent call may take (0 = no limit)
    pub agent_timeout_secs: u64,
    /// 0 enters DEBATE without calling agents
    pub debate_rounds: u32,
    /// Events buffered between a run and its consumer
    pub event_buffer: usize,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            max_concurrent: engine.max_concurrent,
            acquire_timeout_secs: engine.acquire_timeout.map_or(0, |d| d.as_secs()),
            agent_timeout_secs: engine.agent_timeout.map_or(0, |d| d.as_secs()),
            debate_rounds: engine.debate_rounds,
            event_buffer: engine.event_buffer,
        }
    }
}

/// `[quorum]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileQuorumConfig {
    /// Agents that must stay alive for the run to continue
    pub quorum: usize,
    /// Retry credits shared by the whole run
    pub max_retries: u32,
    /// Vote rule: "majority", "unanimous", "atleast:N", "N%"
    pub rule: String,
    pub denominator: VoteDenominator,
    pub require_full_participation: bool,
}

impl Default for FileQuorumConfig {
    fn default() -> Self {
        Self {
            quorum: 2,
            max_retries: 2,
            rule: "majority".to_string(),
            denominator: VoteDenominator::Alive,
            require_full_participation: false,
        }
    }
}

impl FileQuorumConfig {
    pub fn parse_rule(&self) -> Result<QuorumRule, String> {
        self.rule.parse()
    }
}

/// `[budget]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBudgetConfig {
    pub max_tokens: usize,
    pub tokens_per_char: f64,
}

impl Default for FileBudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: 6000,
            tokens_per_char: 0.25,
        }
    }
}

/// `[broadcast]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBroadcastConfig {
    /// Per-subscriber queue capacity; the oldest event is dropped when full
    pub queue_maxsize: usize,
}

impl Default for FileBroadcastConfig {
    fn default() -> Self {
        Self { queue_maxsize: 256 }
    }
}

/// `[agents.<id>]` table: how to reach one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub enabled: bool,
    /// Executable; receives the prompt on stdin
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }
}

impl FileAgentConfig {
    fn cli(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }
}

fn default_agents() -> BTreeMap<String, FileAgentConfig> {
    BTreeMap::from([
        (
            AgentId::Claude.to_string(),
            FileAgentConfig::cli("claude", &["-p"]),
        ),
        (
            AgentId::Codex.to_string(),
            FileAgentConfig::cli("codex", &["exec", "-"]),
        ),
        (
            AgentId::Gemini.to_string(),
            FileAgentConfig::cli("gemini", &[]),
        ),
    ])
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for daily-rotated log files
    pub dir: Option<PathBuf>,
    /// JSONL file receiving every engine event
    pub event_log: Option<PathBuf>,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: FileEngineConfig,
    pub quorum: FileQuorumConfig,
    pub budget: FileBudgetConfig,
    pub broadcast: FileBroadcastConfig,
    /// Keyed by agent id
    pub agents: BTreeMap<String, FileAgentConfig>,
    pub logging: FileLoggingConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            engine: FileEngineConfig::default(),
            quorum: FileQuorumConfig::default(),
            budget: FileBudgetConfig::default(),
            broadcast: FileBroadcastConfig::default(),
            agents: default_agents(),
            logging: FileLoggingConfig::default(),
        }
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

impl FileConfig {
    /// Validate the whole file, returning every detected issue.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for (name, value) in [
            ("engine.max_concurrent", self.engine.max_concurrent),
            ("engine.event_buffer", self.engine.event_buffer),
            ("budget.max_tokens", self.budget.max_tokens),
            ("broadcast.queue_maxsize", self.broadcast.queue_maxsize),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroLimit,
                    format!("{} must be greater than 0", name),
                ));
            }
        }

        let rate = self.budget.tokens_per_char;
        if !rate.is_finite() || rate <= 0.0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidTokenRate,
                format!("budget.tokens_per_char must be a positive number, got {}", rate),
            ));
        }

        if let Err(e) = self.quorum.parse_rule() {
            issues.push(ConfigIssue::error(ConfigIssueCode::InvalidRule, e));
        }

        for (name, agent) in &self.agents {
            if name.parse::<AgentId>().is_err() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownAgent,
                    format!("[agents.{}] is not a known agent (claude, codex, gemini)", name),
                ));
            } else if agent.enabled && agent.command.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::MissingCommand,
                    format!("[agents.{}] is enabled but has no command", name),
                ));
            }
        }

        let enabled = self.enabled_agents().len();
        if enabled == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::NotEnoughAgents,
                "no agents are enabled",
            ));
        } else if self.quorum.quorum == 0 || self.quorum.quorum > enabled {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::QuorumOutOfRange,
                format!(
                    "quorum.quorum = {} but {} agent(s) are enabled",
                    self.quorum.quorum, enabled
                ),
            ));
        }

        if self.engine.debate_rounds == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::NoDebate,
                "engine.debate_rounds = 0: agents vote without debating",
            ));
        }
        if self.engine.max_concurrent > 0 && self.engine.max_concurrent < enabled {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::SerializedAgents,
                format!(
                    "engine.max_concurrent = {} is below the {} enabled agents; calls will queue",
                    self.engine.max_concurrent, enabled
                ),
            ));
        }

        issues
    }

    /// Enabled agents with a recognized id, in roster order
    pub fn enabled_agents(&self) -> Vec<(AgentId, &FileAgentConfig)> {
        let mut agents: Vec<(AgentId, &FileAgentConfig)> = self
            .agents
            .iter()
            .filter(|(_, agent)| agent.enabled)
            .filter_map(|(name, agent)| name.parse().ok().map(|id| (id, agent)))
            .collect();
        agents.sort_by_key(|(id, _)| *id);
        agents
    }

    pub fn vote_policy(&self) -> Result<VotePolicy, DomainError> {
        let rule = self
            .quorum
            .parse_rule()
            .map_err(DomainError::InvalidConfiguration)?;
        let policy = VotePolicy::new(rule, self.quorum.denominator);
        Ok(if self.quorum.require_full_participation {
            policy.with_full_participation()
        } else {
            policy
        })
    }

    /// Engine settings described by this file
    pub fn engine_config(&self) -> Result<EngineConfig, DomainError> {
        let config = EngineConfig::default()
            .with_max_concurrent(self.engine.max_concurrent)
            .with_acquire_timeout(secs(self.engine.acquire_timeout_secs))
            .with_agent_timeout(secs(self.engine.agent_timeout_secs))
            .with_debate_rounds(self.engine.debate_rounds)
            .with_event_buffer(self.engine.event_buffer)
            .with_quorum(self.quorum.quorum)
            .with_max_retries(self.quorum.max_retries)
            .with_budget(self.budget.max_tokens, self.budget.tokens_per_char)
            .with_vote_policy(self.vote_policy()?);
        config.validate()?;
        Ok(config)
    }
}
