//! Run Consensus use case
//!
//! Drives one prompt through THINKING → DEBATE → VOTING with every agent of
//! the roster and aggregates the votes into a [`ConsensusResult`].
//!
//! ```text
//! run.started
//! phase.transition THINKING ─ agents (bounded by ConcurrencyController) ─ stream*
//!   └─ failures: retry while credits remain, else exclude
//!   └─ outputs ─ TokenBudgetManager::enforce ─ context.reduced?
//! phase.transition DEBATE   ─ debate_rounds × (agents + budget)
//! phase.transition VOTING   ─ parse votes ─ VoteTally
//! phase.transition RESOLVED ─ result
//! ```
//!
//! Quorum loss ends the run in ERROR (`run.failed`), cancellation in
//! CANCELLED (`run.cancelled`); neither produces a result event.

use crate::concurrency::{ConcurrencyController, ConcurrencyError};
use crate::config::EngineConfig;
use crate::ports::agent_executor::{AgentChunk, AgentError, AgentExecutor, AgentRequest};
use futures::Stream;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use triad_domain::event::names;
use triad_domain::quorum::parse_vote;
use triad_domain::{
    AgentId, AgentOutput, ConsensusResult, DebateContribution, DomainError, EngineEvent, Phase,
    PhasePrompts, Question, QuorumManager, QuorumState, ReductionLogEntry, TokenBudgetManager,
    Vote, VoteTally, persona_system_prompt,
};

/// Reason recorded in `run.failed` when too few agents remain
pub const QUORUM_EXHAUSTED: &str = "quorum_exhausted";

/// Errors that end a consensus run without a result
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("No agents configured")]
    NoAgents,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error(
        "Quorum exhausted during {phase}: {alive} agents alive, {quorum} required",
        alive = .state.alive,
        quorum = .state.quorum
    )]
    QuorumExhausted {
        phase: Phase,
        state: QuorumState,
        events: Vec<EngineEvent>,
    },

    #[error("Run failed during {phase}: {reason}")]
    Failed {
        phase: Phase,
        reason: String,
        events: Vec<EngineEvent>,
    },

    #[error("Run cancelled")]
    Cancelled { events: Vec<EngineEvent> },

    #[error("Event stream closed before the run finished")]
    StreamClosed,
}

impl ConsensusError {
    /// Events recorded before the run ended
    pub fn events(&self) -> &[EngineEvent] {
        match self {
            ConsensusError::QuorumExhausted { events, .. }
            | ConsensusError::Failed { events, .. }
            | ConsensusError::Cancelled { events } => events,
            _ => &[],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConsensusError::Cancelled { .. })
    }
}

impl From<DomainError> for ConsensusError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidPrompt(message) => ConsensusError::InvalidPrompt(message),
            other => ConsensusError::InvalidConfiguration(other.to_string()),
        }
    }
}

/// The consensus orchestrator
///
/// Cheap to clone; clones share the roster and the concurrency controller.
#[derive(Clone)]
pub struct ConsensusEngine {
    roster: Arc<Vec<(AgentId, Arc<dyn AgentExecutor>)>>,
    concurrency: Arc<ConcurrencyController>,
    config: EngineConfig,
    prompts: PhasePrompts,
}

impl ConsensusEngine {
    pub fn new(
        roster: Vec<(AgentId, Arc<dyn AgentExecutor>)>,
        config: EngineConfig,
    ) -> Result<Self, ConsensusError> {
        if roster.is_empty() {
            return Err(ConsensusError::NoAgents);
        }
        let mut seen = BTreeSet::new();
        for (agent, _) in &roster {
            if !seen.insert(*agent) {
                return Err(ConsensusError::InvalidConfiguration(format!(
                    "agent {} is listed twice",
                    agent
                )));
            }
        }
        config.validate()?;
        QuorumManager::new(roster.len(), config.quorum, config.max_retries)?;
        TokenBudgetManager::new(config.max_tokens, config.tokens_per_char)?;
        let concurrency = ConcurrencyController::new(config.max_concurrent)
            .map_err(|e| ConsensusError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            roster: Arc::new(roster),
            concurrency: Arc::new(concurrency),
            config,
            prompts: PhasePrompts::default(),
        })
    }

    /// Share a controller with other engines so their calls count against
    /// one limit
    pub fn with_concurrency(mut self, concurrency: Arc<ConcurrencyController>) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_prompts(mut self, prompts: PhasePrompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn concurrency(&self) -> &Arc<ConcurrencyController> {
        &self.concurrency
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.roster.iter().map(|(agent, _)| *agent).collect()
    }

    /// Run to completion and return the result
    pub async fn execute(&self, prompt: &str) -> Result<ConsensusResult, ConsensusError> {
        self.execute_with_cancellation(prompt, CancellationToken::new())
            .await
    }

    /// Run to completion; cancelling `cancel` ends the run in CANCELLED
    pub async fn execute_with_cancellation(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<ConsensusResult, ConsensusError> {
        let report = self.run_stream(prompt, cancel)?.into_report().await?;
        let events = report.events;
        match report.end {
            RunEnd::Resolved(result) => Ok(*result),
            RunEnd::QuorumExhausted { phase, state } => Err(ConsensusError::QuorumExhausted {
                phase,
                state,
                events,
            }),
            RunEnd::Failed { phase, reason } => Err(ConsensusError::Failed {
                phase,
                reason,
                events,
            }),
            RunEnd::Cancelled => Err(ConsensusError::Cancelled { events }),
        }
    }

    /// Start a run and return its events as they happen.
    ///
    /// The run executes on a spawned task and pauses whenever the event
    /// buffer is full. Dropping the stream stops the run.
    pub fn run_stream(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<EventStream, ConsensusError> {
        let question = Question::try_new(prompt)?;
        let quorum = QuorumManager::new(
            self.roster.len(),
            self.config.quorum,
            self.config.max_retries,
        )?;
        let budget = TokenBudgetManager::new(self.config.max_tokens, self.config.tokens_per_char)?;
        let (tx, rx) = mpsc::channel(self.config.event_buffer);

        let driver = RunDriver {
            engine: self.clone(),
            prompt: question.into_content(),
            token: cancel.child_token(),
            watch: tx.clone(),
            sink: EventSink::new(tx),
            quorum,
            budget,
            phase: Phase::Queued,
            budget_log: Vec::new(),
        };
        Ok(EventStream {
            receiver: rx,
            driver: tokio::spawn(driver.run()),
        })
    }
}

/// Lazy, finite sequence of a run's events
pub struct EventStream {
    receiver: mpsc::Receiver<EngineEvent>,
    driver: JoinHandle<RunReport>,
}

impl EventStream {
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.receiver.recv().await
    }

    async fn into_report(mut self) -> Result<RunReport, ConsensusError> {
        while self.receiver.recv().await.is_some() {}
        self.driver.await.map_err(|e| {
            warn!(error = %e, "Consensus driver task ended abnormally");
            ConsensusError::StreamClosed
        })
    }
}

impl Stream for EventStream {
    type Item = EngineEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

enum RunEnd {
    Resolved(Box<ConsensusResult>),
    QuorumExhausted { phase: Phase, state: QuorumState },
    Failed { phase: Phase, reason: String },
    Cancelled,
}

struct RunReport {
    end: RunEnd,
    events: Vec<EngineEvent>,
}

/// Why a run stopped early
enum Interrupt {
    Cancelled,
    /// The event consumer went away
    Disconnected,
    QuorumExhausted,
    Failed(String),
}

struct SinkClosed;

enum Wake {
    Cancelled,
    Disconnected,
    Joined(Option<Result<(AgentId, Result<String, AgentError>), tokio::task::JoinError>>),
}

/// Ordered event log plus delivery channel.
///
/// Appending and sending happen under one lock, so the recorded log is
/// exactly the delivered sequence.
#[derive(Clone)]
struct EventSink {
    state: Arc<Mutex<SinkState>>,
}

struct SinkState {
    log: Vec<EngineEvent>,
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSink {
    fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                log: Vec::new(),
                tx,
            })),
        }
    }

    async fn emit(&self, event: EngineEvent) -> Result<(), SinkClosed> {
        let mut state = self.state.lock().await;
        state.tx.send(event.clone()).await.map_err(|_| SinkClosed)?;
        state.log.push(event);
        Ok(())
    }

    async fn take_log(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.state.lock().await.log)
    }
}

/// A successful agent answer, with its vote during VOTING
struct Accepted {
    output: AgentOutput,
    vote: Option<Vote>,
}

fn accept(agent: AgentId, phase: Phase, round: u32, text: String) -> Result<Accepted, AgentError> {
    let vote = if phase == Phase::Voting {
        Some(parse_vote(agent, &text).map_err(|e| AgentError::Malformed(e.to_string()))?)
    } else {
        None
    };
    Ok(Accepted {
        output: AgentOutput::new(agent, phase, round, text),
        vote,
    })
}

fn context_blocks<'a>(outputs: impl IntoIterator<Item = &'a Accepted>) -> String {
    outputs
        .into_iter()
        .map(|a| a.output.as_context_block())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Run-scoped state, owned by the spawned driver task
struct RunDriver {
    engine: ConsensusEngine,
    prompt: String,
    token: CancellationToken,
    /// Resolves `closed()` once the consumer drops the stream
    watch: mpsc::Sender<EngineEvent>,
    sink: EventSink,
    quorum: QuorumManager,
    budget: TokenBudgetManager,
    phase: Phase,
    budget_log: Vec<ReductionLogEntry>,
}

impl RunDriver {
    async fn run(mut self) -> RunReport {
        let end = match self.drive().await {
            Ok(result) => RunEnd::Resolved(Box::new(result)),
            Err(Interrupt::Cancelled) => {
                info!(phase = %self.phase, "Consensus run cancelled");
                let phase = self.phase;
                self.terminate(Phase::Cancelled, names::RUN_CANCELLED, json!({ "phase": phase }))
                    .await;
                RunEnd::Cancelled
            }
            Err(Interrupt::Disconnected) => {
                info!(phase = %self.phase, "Event consumer dropped; stopping run");
                self.token.cancel();
                RunEnd::Cancelled
            }
            Err(Interrupt::QuorumExhausted) => {
                let phase = self.phase;
                let state = self.quorum.current_state();
                warn!(
                    phase = %phase,
                    alive = state.alive,
                    quorum = state.quorum,
                    "Quorum exhausted"
                );
                let data = json!({ "reason": QUORUM_EXHAUSTED, "phase": phase, "quorum": state });
                self.terminate(Phase::Error, names::RUN_FAILED, data).await;
                RunEnd::QuorumExhausted { phase, state }
            }
            Err(Interrupt::Failed(reason)) => {
                let phase = self.phase;
                warn!(phase = %phase, reason = %reason, "Consensus run failed");
                let data = json!({ "reason": reason, "phase": phase });
                self.terminate(Phase::Error, names::RUN_FAILED, data).await;
                RunEnd::Failed { phase, reason }
            }
        };
        RunReport {
            end,
            events: self.sink.take_log().await,
        }
    }

    async fn drive(&mut self) -> Result<ConsensusResult, Interrupt> {
        let agents = self.engine.agent_ids();
        let config = self.engine.config.clone();
        info!(
            agents = agents.len(),
            quorum = config.quorum,
            debate_rounds = config.debate_rounds,
            "Starting consensus run"
        );
        self.emit(EngineEvent::named(
            names::RUN_STARTED,
            json!({
                "agents": agents,
                "quorum": config.quorum,
                "max_retries": config.max_retries,
                "debate_rounds": config.debate_rounds,
                "prompt_tokens": self.budget.estimate_tokens(&self.prompt),
            }),
        ))
        .await?;

        self.enter(Phase::Thinking).await?;
        let thinking = self.run_phase(Phase::Thinking, 1, None).await?;
        let mut carried = self.carry(context_blocks(&thinking), Phase::Thinking).await?;
        let thinking: BTreeMap<AgentId, String> = thinking
            .into_iter()
            .map(|a| (a.output.agent, a.output.content))
            .collect();

        self.enter(Phase::Debate).await?;
        let mut debate = Vec::new();
        for round in 1..=config.debate_rounds {
            let outputs = self.run_phase(Phase::Debate, round, Some(&carried)).await?;
            let combined = format!("{}\n\n{}", carried, context_blocks(&outputs));
            carried = self.carry(combined, Phase::Debate).await?;
            debate.extend(
                outputs
                    .into_iter()
                    .map(|a| DebateContribution::from(a.output)),
            );
        }

        self.enter(Phase::Voting).await?;
        let ballots = self.run_phase(Phase::Voting, 1, Some(&carried)).await?;
        let votes: Vec<Vote> = ballots.into_iter().filter_map(|a| a.vote).collect();

        let tally = VoteTally::aggregate(
            &votes,
            &config.vote_policy,
            self.quorum.current_alive(),
            agents.len(),
        );
        info!(
            decision = %tally.decision,
            votes = %VoteTally::vote_summary(&votes),
            "Votes tallied"
        );
        self.emit(EngineEvent::named(
            names::VOTES_TALLIED,
            json!({
                "approve": tally.approve_count,
                "conditional": tally.conditional_count,
                "reject": tally.reject_count,
                "total": tally.total,
                "decision": tally.decision,
            }),
        ))
        .await?;

        let result = ConsensusResult::new(
            self.prompt.clone(),
            thinking,
            debate,
            votes,
            tally,
            self.quorum.current_state(),
            std::mem::take(&mut self.budget_log),
        );
        self.enter(Phase::Resolved).await?;
        self.emit(EngineEvent::result(result.clone())).await?;
        Ok(result)
    }

    /// Record and deliver an event, unless the run is cancelled first.
    ///
    /// A send waiting on a full channel gives way to cancellation, so no
    /// event (and never the result) goes out once cancel is requested.
    async fn emit(&self, event: EngineEvent) -> Result<(), Interrupt> {
        let token = self.token.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Interrupt::Cancelled),
            sent = self.sink.emit(event) => sent.map_err(|_| Interrupt::Disconnected),
        }
    }

    /// The phase only changes once its transition has been delivered
    async fn enter(&mut self, next: Phase) -> Result<(), Interrupt> {
        if self.token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        let phase = self
            .phase
            .transition(next)
            .map_err(|e| Interrupt::Failed(e.to_string()))?;
        info!(phase = %next, "Entering phase");
        self.emit(EngineEvent::transition(next)).await?;
        self.phase = phase;
        Ok(())
    }

    /// Move to a terminal phase and record why. Delivery failures are
    /// ignored: the consumer may already be gone.
    async fn terminate(&mut self, terminal: Phase, name: &str, data: serde_json::Value) {
        if self.phase.can_transition_to(terminal) {
            self.phase = terminal;
            let _ = self.sink.emit(EngineEvent::transition(terminal)).await;
        }
        let _ = self.sink.emit(EngineEvent::named(name, data)).await;
    }

    /// Budget the context carried into the next prompt
    async fn carry(&mut self, context: String, phase: Phase) -> Result<String, Interrupt> {
        let result = self.budget.enforce(&context, phase);
        for entry in &result.log {
            info!(
                phase = %phase,
                strategy = %entry.strategy,
                before = entry.before_tokens,
                after = entry.after_tokens,
                "Context reduced"
            );
            self.emit(EngineEvent::named(
                names::CONTEXT_REDUCED,
                json!({
                    "phase": entry.phase,
                    "strategy": entry.strategy,
                    "reason": entry.reason,
                    "before_tokens": entry.before_tokens,
                    "after_tokens": entry.after_tokens,
                    "retain_ratio": entry.retain_ratio,
                    "summary_applied": entry.summary_applied,
                }),
            ))
            .await?;
        }
        self.budget_log.extend(result.log);
        Ok(result.context)
    }

    /// Invoke every live agent for one round, retrying or excluding failed
    /// agents until each has either answered or been excluded.
    async fn run_phase(
        &mut self,
        phase: Phase,
        round: u32,
        context: Option<&str>,
    ) -> Result<Vec<Accepted>, Interrupt> {
        self.quorum.begin_phase();
        let mut pending: Vec<AgentId> = self
            .engine
            .agent_ids()
            .into_iter()
            .filter(|agent| !self.quorum.is_excluded(*agent))
            .collect();
        let mut accepted: BTreeMap<AgentId, Accepted> = BTreeMap::new();

        while !pending.is_empty() {
            if self.token.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }

            let mut join_set = JoinSet::new();
            let mut in_flight = BTreeSet::new();
            for agent in std::mem::take(&mut pending) {
                let call = self.agent_call(agent, phase, round, context)?;
                in_flight.insert(agent);
                join_set.spawn(call.run());
            }

            let mut failures = Vec::new();
            let token = self.token.clone();
            let watch = self.watch.clone();
            loop {
                let wake = tokio::select! {
                    biased;
                    _ = token.cancelled() => Wake::Cancelled,
                    _ = watch.closed() => Wake::Disconnected,
                    joined = join_set.join_next() => Wake::Joined(joined),
                };
                let joined = match wake {
                    Wake::Joined(Some(joined)) => joined,
                    Wake::Joined(None) => break,
                    // Aborts in-flight calls and waits for them, releasing their slots
                    Wake::Cancelled => {
                        join_set.shutdown().await;
                        return Err(Interrupt::Cancelled);
                    }
                    Wake::Disconnected => {
                        join_set.shutdown().await;
                        return Err(Interrupt::Disconnected);
                    }
                };
                match joined {
                    Ok((agent, outcome)) => {
                        in_flight.remove(&agent);
                        match outcome.and_then(|text| accept(agent, phase, round, text)) {
                            Ok(answer) => {
                                debug!(agent = %agent, phase = %phase, round, "Agent answered");
                                self.quorum.note_success(agent);
                                accepted.insert(agent, answer);
                            }
                            Err(error) => failures.push((agent, error)),
                        }
                    }
                    Err(e) => warn!(error = %e, "Agent task ended abnormally"),
                }
            }
            failures.extend(
                in_flight
                    .into_iter()
                    .map(|agent| (agent, AgentError::Failed("agent task aborted".to_string()))),
            );
            failures.sort_by_key(|(agent, _)| *agent);

            for (agent, error) in failures {
                self.handle_failure(agent, phase, round, error, &mut pending)
                    .await?;
            }
            if !self.quorum.can_continue() {
                return Err(Interrupt::QuorumExhausted);
            }
        }

        if !self.quorum.can_continue() {
            return Err(Interrupt::QuorumExhausted);
        }
        Ok(accepted.into_values().collect())
    }

    async fn handle_failure(
        &mut self,
        agent: AgentId,
        phase: Phase,
        round: u32,
        error: AgentError,
        pending: &mut Vec<AgentId>,
    ) -> Result<(), Interrupt> {
        if error == AgentError::Cancelled && self.token.is_cancelled() {
            return Ok(());
        }
        warn!(agent = %agent, phase = %phase, round, error = %error, "Agent failed");
        if error.is_rate_limit() {
            self.engine.concurrency.note_rate_limit();
        }
        self.emit(EngineEvent::named(
            names::AGENT_FAILED,
            json!({
                "agent": agent,
                "phase": phase,
                "round": round,
                "kind": error.kind(),
                "error": error.to_string(),
            }),
        ))
        .await?;

        if self.quorum.retries_left() > 0 {
            self.quorum.decrement_retry();
            pending.push(agent);
            self.emit(EngineEvent::named(
                names::AGENT_RETRY,
                json!({
                    "agent": agent,
                    "phase": phase,
                    "round": round,
                    "retries_left": self.quorum.retries_left(),
                }),
            ))
            .await
        } else {
            self.quorum.exclude(agent);
            info!(agent = %agent, alive = self.quorum.current_alive(), "Agent excluded");
            self.emit(EngineEvent::named(
                names::AGENT_EXCLUDED,
                json!({
                    "agent": agent,
                    "phase": phase,
                    "alive": self.quorum.current_alive(),
                }),
            ))
            .await
        }
    }

    fn agent_call(
        &self,
        agent: AgentId,
        phase: Phase,
        round: u32,
        context: Option<&str>,
    ) -> Result<AgentCall, Interrupt> {
        let template = self
            .engine
            .prompts
            .get(phase)
            .ok_or_else(|| Interrupt::Failed(format!("no prompt template for {}", phase)))?;

        let mut vars = BTreeMap::new();
        vars.insert("prompt", self.prompt.clone());
        vars.insert("persona", agent.persona().to_string());
        vars.insert("focus", agent.focus().to_string());
        vars.insert("round", round.to_string());
        vars.insert("context", context.unwrap_or_default().to_string());
        let prompt = template
            .render(&vars)
            .map_err(|e| Interrupt::Failed(e.to_string()))?;

        let executor = self
            .engine
            .roster
            .iter()
            .find(|(id, _)| *id == agent)
            .map(|(_, executor)| Arc::clone(executor))
            .ok_or_else(|| Interrupt::Failed(format!("agent {} is not in the roster", agent)))?;

        Ok(AgentCall {
            executor,
            request: AgentRequest {
                agent,
                phase,
                round,
                system_prompt: persona_system_prompt(agent),
                prompt,
            },
            concurrency: Arc::clone(&self.engine.concurrency),
            sink: self.sink.clone(),
            token: self.token.clone(),
            acquire_timeout: self.engine.config.acquire_timeout,
            agent_timeout: self.engine.config.agent_timeout,
        })
    }
}

/// One agent invocation, run on the phase's JoinSet
struct AgentCall {
    executor: Arc<dyn AgentExecutor>,
    request: AgentRequest,
    concurrency: Arc<ConcurrencyController>,
    sink: EventSink,
    token: CancellationToken,
    acquire_timeout: Option<Duration>,
    agent_timeout: Option<Duration>,
}

impl AgentCall {
    async fn run(self) -> (AgentId, Result<String, AgentError>) {
        let agent = self.request.agent;
        let token = self.token.clone();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(AgentError::Cancelled),
            outcome = self.invoke() => outcome,
        };
        (agent, outcome)
    }

    async fn invoke(&self) -> Result<String, AgentError> {
        let _slot = self
            .concurrency
            .acquire(self.acquire_timeout)
            .await
            .map_err(|e| match e {
                ConcurrencyError::Timeout { waited } => AgentError::Timeout(waited),
                other => AgentError::Failed(other.to_string()),
            })?;

        match self.agent_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream_response())
                .await
                .unwrap_or(Err(AgentError::Timeout(limit))),
            None => self.stream_response().await,
        }
    }

    async fn stream_response(&self) -> Result<String, AgentError> {
        let request = &self.request;
        debug!(
            agent = %request.agent,
            phase = %request.phase,
            round = request.round,
            "Invoking agent"
        );
        let mut stream = self.executor.invoke_streaming(request).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                AgentChunk::Delta(delta) => {
                    self.relay(&delta).await;
                    text.push_str(&delta);
                }
                AgentChunk::Completed(full) => {
                    if text.is_empty() {
                        self.relay(&full).await;
                        text = full;
                    }
                    break;
                }
                AgentChunk::Error(e) => return Err(e),
            }
        }
        if text.trim().is_empty() {
            return Err(AgentError::Malformed("empty response".to_string()));
        }
        Ok(text)
    }

    async fn relay(&self, content: &str) {
        if content.is_empty() {
            return;
        }
        let request = &self.request;
        // A closed sink is noticed by the driver on its next emit
        let _ = self
            .sink
            .emit(EngineEvent::stream(
                request.agent,
                content,
                request.phase,
                request.round,
            ))
            .await;
    }
}
