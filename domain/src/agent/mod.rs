//! Agent identities.
//!
//! The roster is always the three personas in [`identity::AgentId::ALL`].

pub mod identity;

pub use identity::AgentId;
