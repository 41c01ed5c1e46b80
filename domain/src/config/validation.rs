//! Structured configuration issues.
//!
//! Configuration loading reports problems as [`ConfigIssue`]s instead of
//! failing on the first one, so a user sees every problem at once.
//!
//! ```
//! use triad_domain::config::{ConfigIssue, ConfigIssueCode, Severity};
//!
//! let issue = ConfigIssue::error(ConfigIssueCode::QuorumOutOfRange, "quorum 4 > 3 agents");
//! assert!(issue.is_error());
//! assert_eq!(issue.to_string(), "error: quorum 4 > 3 agents");
//! ```

use serde::Serialize;

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fatal: the engine cannot be built.
    Error,
    /// Non-fatal: the engine works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigIssueCode {
    /// `quorum` is zero or larger than the number of enabled agents.
    QuorumOutOfRange,
    /// Fewer enabled agents than the quorum requires.
    NotEnoughAgents,
    /// `max_concurrent`, `max_tokens` or `queue_maxsize` is zero.
    ZeroLimit,
    /// `tokens_per_char` is not a positive finite number.
    InvalidTokenRate,
    /// An `[agents.<id>]` table names an unknown agent.
    UnknownAgent,
    /// An enabled agent has no command to run.
    MissingCommand,
    /// `debate_rounds = 0`: agents vote without debating.
    NoDebate,
    /// Fewer slots than agents: phases run partly sequentially.
    SerializedAgents,
    /// A quorum rule or vote denominator string that does not parse.
    InvalidRule,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}
