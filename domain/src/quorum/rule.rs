//! Vote aggregation rules
//!
//! [`QuorumRule`] decides whether a count of matching votes is enough;
//! [`VotePolicy`] pairs it with the denominator the count is measured
//! against.

use serde::{Deserialize, Serialize};

/// Threshold rule applied to a vote count
///
/// ```
/// use triad_domain::quorum::QuorumRule;
///
/// assert!(QuorumRule::Majority.is_satisfied(2, 3));
/// assert!(!QuorumRule::Unanimous.is_satisfied(2, 3));
/// assert!(QuorumRule::Percentage(60).is_satisfied(2, 3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuorumRule {
    /// Strictly more than half
    #[default]
    Majority,
    /// Every counted agent
    Unanimous,
    /// A fixed number of agents
    AtLeast(usize),
    /// At least this percentage (0-100), rounded up
    Percentage(u8),
}

impl QuorumRule {
    /// Check if `count` out of `total` satisfies this rule
    pub fn is_satisfied(&self, count: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        count >= self.min_required(total)
    }

    /// Minimum count needed out of `total`
    pub fn min_required(&self, total: usize) -> usize {
        match self {
            QuorumRule::Majority => total / 2 + 1,
            QuorumRule::Unanimous => total,
            QuorumRule::AtLeast(n) => *n,
            QuorumRule::Percentage(p) => {
                let p = (*p).min(100) as usize;
                (total * p).div_ceil(100).max(1)
            }
        }
    }

    pub fn description(&self) -> String {
        match self {
            QuorumRule::Majority => "majority (more than half)".to_string(),
            QuorumRule::Unanimous => "unanimous".to_string(),
            QuorumRule::AtLeast(n) => format!("at least {}", n),
            QuorumRule::Percentage(p) => format!("at least {}%", p),
        }
    }
}

impl std::fmt::Display for QuorumRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::str::FromStr for QuorumRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "majority" => Ok(QuorumRule::Majority),
            "unanimous" => Ok(QuorumRule::Unanimous),
            _ => {
                if let Some(n) = s
                    .strip_prefix("atleast:")
                    .or_else(|| s.strip_prefix("at_least:"))
                {
                    return n
                        .parse()
                        .map(QuorumRule::AtLeast)
                        .map_err(|_| format!("Invalid count in '{}'", s));
                }
                if let Some(p) = s
                    .strip_prefix("percentage:")
                    .or_else(|| s.strip_suffix('%'))
                {
                    let p: u8 = p.parse().map_err(|_| format!("Invalid percentage in '{}'", s))?;
                    if p > 100 {
                        return Err(format!("Percentage out of range: {}", p));
                    }
                    return Ok(QuorumRule::Percentage(p));
                }
                Err(format!(
                    "Unknown quorum rule: {}. Valid: majority, unanimous, atleast:N, N%",
                    s
                ))
            }
        }
    }
}

/// What the approval count is measured against at the end of VOTING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoteDenominator {
    /// Agents still alive (not excluded) when voting completes
    #[default]
    Alive,
    /// Only the votes actually cast
    Cast,
    /// The full roster, excluded agents included
    Roster,
}

/// Configurable vote aggregation policy
///
/// Default: `Majority` over alive agents, and a decision made from partial
/// results is allowed. With `require_full_participation`, a run where some
/// alive agent failed to vote resolves to `NO_CONSENSUS` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VotePolicy {
    pub rule: QuorumRule,
    pub denominator: VoteDenominator,
    #[serde(default)]
    pub require_full_participation: bool,
}

impl VotePolicy {
    pub fn new(rule: QuorumRule, denominator: VoteDenominator) -> Self {
        Self {
            rule,
            denominator,
            require_full_participation: false,
        }
    }

    pub fn with_full_participation(mut self) -> Self {
        self.require_full_participation = true;
        self
    }

    /// Resolve the denominator for a concrete run
    pub fn total(&self, cast: usize, alive: usize, roster: usize) -> usize {
        match self.denominator {
            VoteDenominator::Alive => alive,
            VoteDenominator::Cast => cast,
            VoteDenominator::Roster => roster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_of_three_and_two() {
        assert_eq!(QuorumRule::Majority.min_required(3), 2);
        assert_eq!(QuorumRule::Majority.min_required(2), 2);
        assert!(!QuorumRule::Majority.is_satisfied(1, 2));
    }

    #[test]
    fn test_percentage_rounds_up() {
        // 67% of 3 = 2.01 → 3
        assert_eq!(QuorumRule::Percentage(67).min_required(3), 3);
        assert_eq!(QuorumRule::Percentage(66).min_required(3), 2);
        assert_eq!(QuorumRule::Percentage(0).min_required(3), 1);
    }

    #[test]
    fn test_zero_total_never_satisfied() {
        assert!(!QuorumRule::AtLeast(0).is_satisfied(0, 0));
        assert!(!QuorumRule::Unanimous.is_satisfied(0, 0));
    }

    #[test]
    fn test_parse_rules() {
        assert_eq!("Majority".parse::<QuorumRule>(), Ok(QuorumRule::Majority));
        assert_eq!("atleast:2".parse::<QuorumRule>(), Ok(QuorumRule::AtLeast(2)));
        assert_eq!("75%".parse::<QuorumRule>(), Ok(QuorumRule::Percentage(75)));
        assert!("150%".parse::<QuorumRule>().is_err());
        assert!("most".parse::<QuorumRule>().is_err());
    }

    #[test]
    fn test_policy_denominator() {
        let policy = VotePolicy::default();
        assert_eq!(policy.total(2, 3, 3), 3);
        let cast = VotePolicy::new(QuorumRule::Majority, VoteDenominator::Cast);
        assert_eq!(cast.total(2, 3, 3), 2);
        let roster = VotePolicy::new(QuorumRule::Unanimous, VoteDenominator::Roster);
        assert_eq!(roster.total(1, 2, 3), 3);
    }

    #[test]
    fn test_policy_deserialize() {
        let json = r#"{"rule": {"at_least": 2}, "denominator": "cast"}"#;
        let policy: VotePolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.rule, QuorumRule::AtLeast(2));
        assert_eq!(policy.denominator, VoteDenominator::Cast);
        assert!(!policy.require_full_participation);
    }
}
