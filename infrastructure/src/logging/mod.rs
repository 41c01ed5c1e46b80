//! Logging infrastructure: structured engine event logging.
//!
//! Provides [`JsonlEventLogger`], an append-only JSONL writer for
//! [`EngineEvent`](triad_domain::EngineEvent)s.

mod jsonl_logger;

pub use jsonl_logger::JsonlEventLogger;
