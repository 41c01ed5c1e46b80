//! Vote response parsing.
//!
//! Extracts a structured [`Vote`] from an agent's free-form VOTING output.
//! Pure text matching: no I/O.
//!
//! # Supported formats
//!
//! 1. **JSON** (preferred): `{"decision": "approve", "confidence": 0.8, "conditions": [...]}`
//! 2. **Labelled lines**:
//!
//! ```text
//! DECISION: CONDITIONAL
//! CONFIDENCE: 80%
//! REASONING: Fine once the migration is reversible.
//! CONDITIONS:
//! - Provide a down migration
//! - Run it on staging first
//! ```
//!
//! Output without a recognizable decision is malformed.

use super::vote::{Vote, VoteDecision};
use crate::agent::AgentId;
use crate::core::error::DomainError;

/// Parse an agent's VOTING output into a [`Vote`]
///
/// ```
/// use triad_domain::{AgentId, VoteDecision};
/// use triad_domain::quorum::parse_vote;
///
/// let vote = parse_vote(AgentId::Claude, "DECISION: approve\nREASONING: solid").unwrap();
/// assert_eq!(vote.decision, VoteDecision::Approve);
/// assert_eq!(vote.reasoning, "solid");
///
/// assert!(parse_vote(AgentId::Claude, "I have thoughts").is_err());
/// ```
pub fn parse_vote(agent: AgentId, response: &str) -> Result<Vote, DomainError> {
    if let Some(vote) = parse_json_vote(agent, response) {
        return Ok(vote);
    }
    parse_labelled_vote(agent, response)
}

/// Map a decision keyword to a [`VoteDecision`]
pub fn parse_decision_keyword(value: &str) -> Option<VoteDecision> {
    let upper = value.trim().to_uppercase();
    let upper = upper.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != ' ');

    if upper.starts_with("CONDITIONAL")
        || upper.starts_with("APPROVE WITH CONDITION")
        || upper.starts_with("APPROVED WITH CONDITION")
    {
        return Some(VoteDecision::Conditional);
    }
    match upper.split_whitespace().next()? {
        "APPROVE" | "APPROVED" | "YES" | "ACCEPT" => Some(VoteDecision::Approve),
        "REJECT" | "REJECTED" | "NO" | "DENY" => Some(VoteDecision::Reject),
        _ => None,
    }
}

fn parse_json_vote(agent: AgentId, response: &str) -> Option<Vote> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&response[start..=end]).ok()?;
    let decision = value
        .get("decision")
        .or_else(|| value.get("vote"))
        .and_then(|v| v.as_str())
        .and_then(parse_decision_keyword)?;

    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let conditions = value
        .get("conditions")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.as_str())
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut vote = Vote::new(agent, decision, reasoning).with_conditions(conditions);
    if let Some(confidence) = value.get("confidence").and_then(|v| v.as_f64()) {
        vote = vote.with_confidence(normalize_confidence(confidence));
    }
    Some(vote)
}

fn parse_labelled_vote(agent: AgentId, response: &str) -> Result<Vote, DomainError> {
    let mut decision = None;
    let mut confidence = None;
    let mut reasoning: Option<String> = None;
    let mut conditions = Vec::new();
    let mut in_conditions = false;

    for raw in response.lines() {
        let line = strip_decoration(raw);

        if let Some(value) = label_value(line, &["DECISION", "VOTE", "FINAL DECISION"]) {
            in_conditions = false;
            if decision.is_none() {
                decision = parse_decision_keyword(value);
            }
            continue;
        }
        if let Some(value) = label_value(line, &["CONFIDENCE"]) {
            in_conditions = false;
            confidence = value
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .ok()
                .map(normalize_confidence);
            continue;
        }
        if let Some(value) = label_value(line, &["REASONING", "RATIONALE"]) {
            in_conditions = false;
            reasoning = Some(value.trim().to_string());
            continue;
        }
        if let Some(value) = label_value(line, &["CONDITIONS", "CONDITION"]) {
            in_conditions = true;
            conditions.extend(
                value
                    .split(';')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("none")),
            );
            continue;
        }
        if in_conditions {
            match bullet_item(raw) {
                Some(item) => conditions.push(item.to_string()),
                None if raw.trim().is_empty() => {}
                None => in_conditions = false,
            }
        }
    }

    let decision = decision.ok_or_else(|| DomainError::MalformedVote {
        agent: agent.to_string(),
        reason: "no DECISION line found".to_string(),
    })?;

    let reasoning = reasoning.unwrap_or_else(|| response.trim().to_string());
    let mut vote = Vote::new(agent, decision, reasoning).with_conditions(conditions);
    if let Some(c) = confidence {
        vote = vote.with_confidence(c);
    }
    Ok(vote)
}

/// Strip markdown emphasis and heading markers around a label line
fn strip_decoration(line: &str) -> &str {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim_matches('_')
        .trim()
}

/// Return the text after `LABEL:` if the line starts with one of `labels`
fn label_value<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let (label, value) = line.split_once(':')?;
    let label = label.trim().trim_matches('*').trim();
    labels
        .iter()
        .any(|l| label.eq_ignore_ascii_case(l))
        .then(|| value.trim_start_matches('*').trim())
}

fn bullet_item(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let item = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| {
            let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return None;
            }
            trimmed[digits..]
                .strip_prefix(". ")
                .or_else(|| trimmed[digits..].strip_prefix(") "))
        })?;
    let item = item.trim();
    (!item.is_empty()).then_some(item)
}

/// Accept both 0-1 and 0-100 scales
fn normalize_confidence(value: f64) -> f64 {
    if value > 1.0 { value / 100.0 } else { value }
}
