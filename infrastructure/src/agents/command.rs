//! Subprocess-backed agent executor
//!
//! Runs an agent CLI per call: the persona system prompt and the phase
//! prompt are written to stdin, stdout is streamed back line by line, and
//! a non-zero exit is classified from stderr.

use crate::config::FileAgentConfig;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use triad_application::{AgentChunk, AgentError, AgentExecutor, AgentRequest, AgentStream};
use triad_domain::AgentId;
use triad_domain::util::truncate_chars;

/// Longest stderr excerpt carried in an error
const MAX_STDERR_CHARS: usize = 500;

const RATE_LIMIT_MARKERS: [&str; 4] = ["rate limit", "rate-limit", "429", "too many requests"];

/// Map a failed exit to an [`AgentError`]
pub fn classify_failure(status: Option<i32>, stderr: &str) -> AgentError {
    let excerpt = truncate_chars(stderr.trim(), MAX_STDERR_CHARS).to_string();
    let lower = stderr.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        return AgentError::RateLimited(excerpt);
    }
    let status = status.map_or_else(|| "signal".to_string(), |code| code.to_string());
    if excerpt.is_empty() {
        AgentError::Failed(format!("exited with status {}", status))
    } else {
        AgentError::Failed(format!("exited with status {}: {}", status, excerpt))
    }
}

/// Agent reached by running a command
#[derive(Debug, Clone)]
pub struct CommandAgentExecutor {
    agent: AgentId,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandAgentExecutor {
    pub fn new(agent: AgentId, command: impl Into<String>) -> Self {
        Self {
            agent,
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    pub fn from_config(agent: AgentId, config: &FileAgentConfig) -> Self {
        Self {
            agent,
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    fn spawn(&self) -> Result<Child, AgentError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        // Linux: have the kernel terminate the agent if we die without dropping it
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        cmd.spawn().map_err(|e| {
            AgentError::Failed(format!("could not start '{}': {}", self.command, e))
        })
    }
}

#[async_trait]
impl AgentExecutor for CommandAgentExecutor {
    async fn invoke(&self, request: &AgentRequest) -> Result<String, AgentError> {
        self.invoke_streaming(request).await?.collect_text().await
    }

    async fn invoke_streaming(&self, request: &AgentRequest) -> Result<AgentStream, AgentError> {
        let mut child = self.spawn()?;
        debug!(
            agent = %self.agent,
            command = %self.command,
            phase = %request.phase,
            "Spawned agent process"
        );

        let missing = |pipe: &str| AgentError::Failed(format!("could not capture {}", pipe));
        let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let input = format!("{}\n\n{}\n", request.system_prompt, request.prompt);
        tokio::spawn(async move {
            // The agent may exit without reading everything; that is not our error
            let _ = stdin.write_all(input.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let (tx, rx) = mpsc::channel(32);
        let agent = self.agent;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut text = String::new();
            loop {
                let line = tokio::select! {
                    // Consumer gone: dropping `child` kills the process
                    _ = tx.closed() => return,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) => {
                        let chunk = format!("{}\n", line);
                        text.push_str(&chunk);
                        if tx.send(AgentChunk::Delta(chunk)).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(AgentChunk::Error(AgentError::Failed(format!(
                                "reading output: {}",
                                e
                            ))))
                            .await;
                        return;
                    }
                }
            }

            let status = child.wait().await;
            let stderr = stderr_task.await.unwrap_or_default();
            let chunk = finish(agent, status, &stderr, text);
            let _ = tx.send(chunk).await;
        });

        Ok(AgentStream::new(rx))
    }
}

fn finish(
    agent: AgentId,
    status: std::io::Result<ExitStatus>,
    stderr: &str,
    text: String,
) -> AgentChunk {
    match status {
        Ok(status) if status.success() => AgentChunk::Completed(text),
        Ok(status) => {
            let error = classify_failure(status.code(), stderr);
            warn!(agent = %agent, error = %error, "Agent process failed");
            AgentChunk::Error(error)
        }
        Err(e) => AgentChunk::Error(AgentError::Failed(format!("waiting for agent: {}", e))),
    }
}
