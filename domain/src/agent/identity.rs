//! Agent identity value object

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// One of the three fixed personas taking part in a consensus run.
///
/// The roster is fixed when a run is built; agents can be excluded from a
/// run but never added to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Claude,
    Codex,
    Gemini,
}

impl AgentId {
    /// All agents in roster order
    pub const ALL: [AgentId; 3] = [AgentId::Claude, AgentId::Codex, AgentId::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Claude => "claude",
            AgentId::Codex => "codex",
            AgentId::Gemini => "gemini",
        }
    }

    /// Persona label used in prompts and console output
    pub fn persona(&self) -> &'static str {
        match self {
            AgentId::Claude => "Architect",
            AgentId::Codex => "Implementer",
            AgentId::Gemini => "Skeptic",
        }
    }

    /// Short focus statement injected into the persona system prompt
    pub fn focus(&self) -> &'static str {
        match self {
            AgentId::Claude => "overall design, long-term maintainability and trade-offs",
            AgentId::Codex => "concrete implementation effort, correctness and edge cases",
            AgentId::Gemini => "risks, failure modes and what could go wrong",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(AgentId::Claude),
            "codex" => Ok(AgentId::Codex),
            "gemini" => Ok(AgentId::Gemini),
            other => Err(DomainError::UnknownAgent(other.to_string())),
        }
    }
}
