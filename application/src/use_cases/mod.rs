//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod run_consensus;
pub mod session;

pub use run_consensus::{ConsensusEngine, ConsensusError, EventStream};
pub use session::{SessionManager, SessionStatus};
