//! Prompt value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// The question put to the three agents (Value Object)
///
/// Always non-blank; construction goes through [`Question::try_new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    content: String,
}

impl Question {
    /// Create a question, rejecting empty or whitespace-only content
    pub fn try_new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::InvalidPrompt(
                "prompt cannot be empty".to_string(),
            ));
        }
        Ok(Self { content })
    }

    /// Get the question content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume and return the inner content
    pub fn into_content(self) -> String {
        self.content
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_creation() {
        let q = Question::try_new("Should we ship the migration?").unwrap();
        assert_eq!(q.content(), "Should we ship the migration?");
        assert_eq!(q.to_string(), "Should we ship the migration?");
    }

    #[test]
    fn test_blank_question_rejected() {
        assert!(Question::try_new("").is_err());
        assert!(matches!(
            Question::try_new("   \n\t"),
            Err(DomainError::InvalidPrompt(_))
        ));
    }
}
