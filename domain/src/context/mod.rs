//! Context carried between phases.
//!
//! Each phase's aggregated agent output is budgeted by
//! [`TokenBudgetManager`] before it is embedded in the next phase's prompt.

pub mod segment;
pub mod token_budget;

pub use segment::{Segment, segment_context};
pub use token_budget::{ReductionLogEntry, ReductionStrategy, TokenBudgetManager, TokenBudgetResult};
