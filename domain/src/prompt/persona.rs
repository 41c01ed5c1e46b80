//! Persona system prompts

use crate::agent::AgentId;

/// System prompt establishing an agent's persona for a whole run
pub fn persona_system_prompt(agent: AgentId) -> String {
    format!(
        "You are {name}, acting as the {persona} on a three-agent panel that must reach a \
         single decision. Concentrate on {focus}. Be direct and concise; disagree openly when \
         you have reason to.",
        name = agent.as_str(),
        persona = agent.persona(),
        focus = agent.focus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_prompts_differ() {
        let prompts: Vec<String> = AgentId::ALL.iter().map(|a| persona_system_prompt(*a)).collect();
        assert!(prompts[0].contains("Architect"));
        assert!(prompts[1].contains("Implementer"));
        assert!(prompts[2].contains("Skeptic"));
        assert_ne!(prompts[0], prompts[2]);
    }
}
