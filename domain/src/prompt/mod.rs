//! Prompt domain
//!
//! Versioned phase templates and persona system prompts.

pub mod persona;
pub mod template;

pub use persona::persona_system_prompt;
pub use template::{PhasePromptTemplate, PhasePrompts};
