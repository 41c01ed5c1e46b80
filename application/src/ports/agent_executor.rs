//! Agent executor port
//!
//! Defines how the engine talks to a single agent backend. Adapters (a CLI
//! process, an HTTP client, a test script) live outside the application
//! layer.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use triad_domain::{AgentId, Phase};

/// Errors an agent invocation can end with
///
/// All of these are absorbed into quorum bookkeeping by the engine; none of
/// them aborts a run on its own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Malformed output: {0}")]
    Malformed(String),

    #[error("Agent failed: {0}")]
    Failed(String),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AgentError::RateLimited(_))
    }

    /// Short machine-readable kind, used in event data
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Timeout(_) => "timeout",
            AgentError::RateLimited(_) => "rate_limited",
            AgentError::Malformed(_) => "malformed",
            AgentError::Failed(_) => "failed",
            AgentError::Cancelled => "cancelled",
        }
    }
}

/// A single prompt sent to one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub agent: AgentId,
    pub phase: Phase,
    pub round: u32,
    /// Persona system prompt
    pub system_prompt: String,
    /// Rendered phase prompt
    pub prompt: String,
}

/// Incremental output of a streaming invocation
#[derive(Debug, Clone, PartialEq)]
pub enum AgentChunk {
    /// A piece of text
    Delta(String),
    /// Final text; may repeat the concatenated deltas
    Completed(String),
    Error(AgentError),
}

/// Handle for receiving streaming output from an agent.
pub struct AgentStream {
    receiver: mpsc::Receiver<AgentChunk>,
}

impl AgentStream {
    pub fn new(receiver: mpsc::Receiver<AgentChunk>) -> Self {
        Self { receiver }
    }

    /// Stream that yields a single completed response
    pub fn completed(text: String) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: try_send cannot fail
        let _ = tx.try_send(AgentChunk::Completed(text));
        Self::new(rx)
    }

    pub async fn next(&mut self) -> Option<AgentChunk> {
        self.receiver.recv().await
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, AgentError> {
        let mut full_text = String::new();
        while let Some(chunk) = self.next().await {
            match chunk {
                AgentChunk::Delta(text) => full_text.push_str(&text),
                AgentChunk::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                AgentChunk::Error(e) => return Err(e),
            }
        }
        // Channel closed without Completed: keep what arrived
        Ok(full_text)
    }
}

/// A backend able to answer prompts as one agent
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Send a prompt and wait for the full response
    async fn invoke(&self, request: &AgentRequest) -> Result<String, AgentError>;

    /// Send a prompt and stream the response.
    ///
    /// Default implementation calls `invoke()` and wraps the result in a
    /// single `Completed` chunk.
    async fn invoke_streaming(&self, request: &AgentRequest) -> Result<AgentStream, AgentError> {
        let text = self.invoke(request).await?;
        Ok(AgentStream::completed(text))
    }
}
