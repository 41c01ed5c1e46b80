//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Malformed vote from {agent}: {reason}")]
    MalformedVote { agent: String, reason: String },

    #[error("Template '{template}' is missing required variable '{variable}'")]
    MissingTemplateVariable { template: String, variable: String },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}

impl DomainError {
    /// Shorthand for an invalid-configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        DomainError::InvalidConfiguration(message.into())
    }

    /// Check if this error was raised while validating configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, DomainError::InvalidConfiguration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let error = DomainError::invalid_config("max_tokens must be > 0");
        assert_eq!(
            error.to_string(),
            "Invalid configuration: max_tokens must be > 0"
        );
        assert!(error.is_configuration());
    }

    #[test]
    fn test_transition_display() {
        let error = DomainError::InvalidTransition {
            from: "voting".to_string(),
            to: "thinking".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid phase transition: voting -> thinking");
        assert!(!error.is_configuration());
    }
}
