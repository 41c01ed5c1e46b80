//! Phase prompt templates.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` produce literal braces.
//! Rendering fails when a required variable is missing, so a malformed
//! template never reaches an agent.

use crate::core::error::DomainError;
use crate::orchestration::phase::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A versioned prompt template for one working phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasePromptTemplate {
    pub name: String,
    pub version: String,
    pub phase: Phase,
    /// Variables that must be supplied to `render`
    pub required: Vec<String>,
    pub body: String,
}

impl PhasePromptTemplate {
    /// Build a custom template, checking that every required variable is
    /// referenced by the body.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        phase: Phase,
        required: &[&str],
        body: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let template = Self {
            name: name.into(),
            version: version.into(),
            phase,
            required: required.iter().map(|r| r.to_string()).collect(),
            body: body.into(),
        };
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.phase.is_working() {
            return Err(DomainError::invalid_config(format!(
                "template '{}' targets non-working phase {}",
                self.name, self.phase
            )));
        }
        let placeholders = placeholders(&self.body);
        for required in &self.required {
            if !placeholders.iter().any(|p| p == required) {
                return Err(DomainError::invalid_config(format!(
                    "template '{}' never uses required variable '{}'",
                    self.name, required
                )));
            }
        }
        Ok(())
    }

    /// Substitute `vars` into the body.
    ///
    /// Every required variable and every placeholder in the body must be
    /// present in `vars`.
    pub fn render(&self, vars: &BTreeMap<&str, String>) -> Result<String, DomainError> {
        let missing = |variable: &str| DomainError::MissingTemplateVariable {
            template: self.name.clone(),
            variable: variable.to_string(),
        };
        if let Some(required) = self.required.iter().find(|r| !vars.contains_key(r.as_str())) {
            return Err(missing(required));
        }

        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();
        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{{") {
                out.push('{');
                rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                out.push('}');
                rest = after;
            } else if let Some((name, after)) = placeholder_at(tail) {
                let value = vars.get(name).ok_or_else(|| missing(name))?;
                out.push_str(value);
                rest = after;
            } else {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    pub fn thinking() -> Self {
        Self::builtin(
            "thinking",
            Phase::Thinking,
            &["prompt", "persona", "focus"],
            r#"You are the {persona} in a three-agent review panel. Focus on {focus}.

Think independently about the following request before any discussion takes place:

{prompt}

Give your analysis in a few short paragraphs. End with a line starting with "Summary:" that states your position in one sentence."#,
        )
    }

    pub fn debate() -> Self {
        Self::builtin(
            "debate",
            Phase::Debate,
            &["prompt", "persona", "focus", "round", "context"],
            r#"You are the {persona} in a three-agent review panel. Focus on {focus}.

Request under discussion:

{prompt}

Debate round {round}. Positions so far:

{context}

Respond to the other agents: point out where you agree, where you disagree and why. Revise your own position if you were persuaded. End with a "Summary:" line."#,
        )
    }

    pub fn voting() -> Self {
        Self::builtin(
            "voting",
            Phase::Voting,
            &["prompt", "persona", "focus", "context"],
            r#"You are the {persona} in a three-agent review panel. Focus on {focus}.

Request under decision:

{prompt}

Discussion so far:

{context}

Cast your final vote. Reply in exactly this format:

DECISION: APPROVE | REJECT | CONDITIONAL
CONFIDENCE: a number between 0 and 1
REASONING: one short paragraph
CONDITIONS:
- one line per condition (only for CONDITIONAL)"#,
        )
    }

    /// Built-in template for a working phase
    pub fn for_phase(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Thinking => Some(Self::thinking()),
            Phase::Debate => Some(Self::debate()),
            Phase::Voting => Some(Self::voting()),
            _ => None,
        }
    }

    fn builtin(name: &str, phase: Phase, required: &[&str], body: &str) -> Self {
        Self {
            name: name.to_string(),
            version: BUILTIN_VERSION.to_string(),
            phase,
            required: required.iter().map(|r| r.to_string()).collect(),
            body: body.to_string(),
        }
    }
}

const BUILTIN_VERSION: &str = "1.0.0";

/// Templates for all three working phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePrompts {
    pub thinking: PhasePromptTemplate,
    pub debate: PhasePromptTemplate,
    pub voting: PhasePromptTemplate,
}

impl PhasePrompts {
    pub fn get(&self, phase: Phase) -> Option<&PhasePromptTemplate> {
        match phase {
            Phase::Thinking => Some(&self.thinking),
            Phase::Debate => Some(&self.debate),
            Phase::Voting => Some(&self.voting),
            _ => None,
        }
    }

    /// Replace one template; its phase decides the slot
    pub fn with_template(mut self, template: PhasePromptTemplate) -> Result<Self, DomainError> {
        template.validate()?;
        match template.phase {
            Phase::Thinking => self.thinking = template,
            Phase::Debate => self.debate = template,
            Phase::Voting => self.voting = template,
            other => {
                return Err(DomainError::invalid_config(format!(
                    "no template slot for phase {}",
                    other
                )));
            }
        }
        Ok(self)
    }
}

impl Default for PhasePrompts {
    fn default() -> Self {
        Self {
            thinking: PhasePromptTemplate::thinking(),
            debate: PhasePromptTemplate::debate(),
            voting: PhasePromptTemplate::voting(),
        }
    }
}

/// `{name}` at the start of `s`, returning the name and the remainder
fn placeholder_at(s: &str) -> Option<(&str, &str)> {
    let inner = s.strip_prefix('{')?;
    let end = inner.find('}')?;
    let name = &inner[..end];
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| (name, &inner[end + 1..]))
}

fn placeholders(body: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = body;
    while let Some(pos) = rest.find('{') {
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{{") {
            rest = after;
        } else if let Some((name, after)) = placeholder_at(tail) {
            found.push(name);
            rest = after;
        } else {
            rest = &tail[1..];
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> BTreeMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_builtins_are_valid() {
        let prompts = PhasePrompts::default();
        for phase in Phase::WORKING {
            let template = prompts.get(phase).unwrap();
            assert_eq!(template.phase, phase);
            assert_eq!(template.version, "1.0.0");
            template.validate().unwrap();
        }
        assert!(prompts.get(Phase::Resolved).is_none());
        assert!(PhasePromptTemplate::for_phase(Phase::Queued).is_none());
    }

    #[test]
    fn test_render_thinking() {
        let rendered = PhasePromptTemplate::thinking()
            .render(&vars(&[("prompt", "Adopt Rust?"), ("persona", "Skeptic"), ("focus", "risks")]))
            .unwrap();
        assert!(rendered.contains("You are the Skeptic"));
        assert!(rendered.contains("Adopt Rust?"));
        assert!(!rendered.contains('{'));
    }

    #[test]
    fn test_missing_variable() {
        let err = PhasePromptTemplate::debate()
            .render(&vars(&[("prompt", "x"), ("persona", "p"), ("focus", "f")]))
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::MissingTemplateVariable { ref template, ref variable }
                if template == "debate" && variable == "round"
        ));
    }

    #[test]
    fn test_escaped_braces_and_unrequired_placeholder() {
        let template =
            PhasePromptTemplate::new("json", "2", Phase::Voting, &["prompt"], "{{\"q\": \"{prompt}\"}} {extra}")
                .unwrap();
        let out = template
            .render(&vars(&[("prompt", "ok"), ("extra", "!")]))
            .unwrap();
        assert_eq!(out, "{\"q\": \"ok\"} !");

        // placeholders outside `required` still need a value
        assert!(template.render(&vars(&[("prompt", "ok")])).is_err());
    }

    #[test]
    fn test_invalid_custom_template() {
        assert!(PhasePromptTemplate::new("t", "1", Phase::Thinking, &["prompt"], "no vars").is_err());
        assert!(PhasePromptTemplate::new("t", "1", Phase::Error, &[], "body").is_err());
    }

    #[test]
    fn test_with_template_replaces_slot() {
        let custom =
            PhasePromptTemplate::new("short-vote", "2.0", Phase::Voting, &["prompt"], "Vote on {prompt}").unwrap();
        let prompts = PhasePrompts::default().with_template(custom).unwrap();
        assert_eq!(prompts.voting.name, "short-vote");
        assert_eq!(prompts.thinking.name, "thinking");
    }
}
