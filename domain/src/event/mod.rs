//! Events emitted by a consensus run.
//!
//! Every state change of a run is recorded as an [`EngineEvent`], in the
//! order it happened. The serialized form is tagged on `type`:
//!
//! ```json
//! {"type": "phase.transition", "phase": "DEBATE"}
//! {"type": "stream", "agent": "codex", "content": "...", "phase": "DEBATE", "round": 1}
//! {"type": "event", "name": "context.reduced", "data": {"strategy": "with_summary"}}
//! {"type": "result", "result": {...}}
//! ```

use crate::agent::AgentId;
use crate::orchestration::phase::Phase;
use crate::orchestration::value_objects::ConsensusResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Names of `event`-type events
pub mod names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FAILED: &str = "run.failed";
    pub const RUN_CANCELLED: &str = "run.cancelled";
    pub const AGENT_FAILED: &str = "agent.failed";
    pub const AGENT_RETRY: &str = "agent.retry";
    pub const AGENT_EXCLUDED: &str = "agent.excluded";
    pub const CONTEXT_REDUCED: &str = "context.reduced";
    pub const VOTES_TALLIED: &str = "votes.tallied";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Named event with free-form data
    #[serde(rename = "event")]
    Event {
        name: String,
        #[serde(default)]
        data: Map<String, Value>,
    },
    #[serde(rename = "phase.transition")]
    PhaseTransition { phase: Phase },
    /// Live content chunk from one agent
    #[serde(rename = "stream")]
    Stream {
        agent: AgentId,
        content: String,
        phase: Phase,
        round: u32,
    },
    #[serde(rename = "result")]
    Result { result: Box<ConsensusResult> },
}

impl EngineEvent {
    /// Build a named event. Non-object `data` is stored under `"value"`.
    pub fn named(name: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        EngineEvent::Event {
            name: name.into(),
            data,
        }
    }

    pub fn transition(phase: Phase) -> Self {
        EngineEvent::PhaseTransition { phase }
    }

    pub fn stream(agent: AgentId, content: impl Into<String>, phase: Phase, round: u32) -> Self {
        EngineEvent::Stream {
            agent,
            content: content.into(),
            phase,
            round,
        }
    }

    pub fn result(result: ConsensusResult) -> Self {
        EngineEvent::Result {
            result: Box::new(result),
        }
    }

    /// Serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Event { .. } => "event",
            EngineEvent::PhaseTransition { .. } => "phase.transition",
            EngineEvent::Stream { .. } => "stream",
            EngineEvent::Result { .. } => "result",
        }
    }

    /// Name of an `event`-type event
    pub fn name(&self) -> Option<&str> {
        match self {
            EngineEvent::Event { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_named(&self, expected: &str) -> bool {
        self.name() == Some(expected)
    }

    pub fn as_result(&self) -> Option<&ConsensusResult> {
        match self {
            EngineEvent::Result { result } => Some(result),
            _ => None,
        }
    }

    /// Phase this event moved the run into
    pub fn transitioned_to(&self) -> Option<Phase> {
        match self {
            EngineEvent::PhaseTransition { phase } => Some(*phase),
            _ => None,
        }
    }

    /// Whether no event can follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Result { .. })
            || self.transitioned_to().is_some_and(|p| p.is_terminal())
            || self.is_named(names::RUN_FAILED)
            || self.is_named(names::RUN_CANCELLED)
    }

    /// Serialize to a JSON object
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "type": "event", "name": "serialization.failed", "data": { "error": e.to_string() } })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        assert_eq!(
            EngineEvent::transition(Phase::Debate).to_json(),
            json!({"type": "phase.transition", "phase": "DEBATE"})
        );
        assert_eq!(
            EngineEvent::stream(AgentId::Codex, "hi", Phase::Thinking, 1).to_json(),
            json!({"type": "stream", "agent": "codex", "content": "hi", "phase": "THINKING", "round": 1})
        );
        assert_eq!(
            EngineEvent::named(names::RUN_STARTED, json!({"agents": 3})).to_json(),
            json!({"type": "event", "name": "run.started", "data": {"agents": 3}})
        );
    }

    #[test]
    fn test_named_wraps_scalars() {
        let event = EngineEvent::named("x", json!(5));
        assert_eq!(event.to_json()["data"]["value"], 5);
        let event = EngineEvent::named("y", Value::Null);
        assert_eq!(event.to_json()["data"], json!({}));
    }

    #[test]
    fn test_deserialize_round_trip() {
        let json = r#"{"type":"event","name":"agent.failed"}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        assert!(event.is_named(names::AGENT_FAILED));
        assert_eq!(event.kind(), "event");
    }

    #[test]
    fn test_terminal_events() {
        assert!(EngineEvent::transition(Phase::Cancelled).is_terminal());
        assert!(!EngineEvent::transition(Phase::Voting).is_terminal());
        assert!(EngineEvent::named(names::RUN_FAILED, json!({})).is_terminal());
        assert!(!EngineEvent::named(names::CONTEXT_REDUCED, json!({})).is_terminal());
    }
}
