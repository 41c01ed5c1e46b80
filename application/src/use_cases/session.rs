//! Session layer over [`ConsensusEngine`].
//!
//! Each session owns one run. Its events are relayed as JSON into an
//! [`EventBroadcaster`] keyed by the session id, so any number of
//! observers can follow it. Sessions are created in QUEUED and started
//! with [`SessionManager::launch`], which leaves room to subscribe before
//! the first event is published.

use super::run_consensus::{ConsensusEngine, ConsensusError, EventStream};
use crate::broadcaster::{EventBroadcaster, SubscriberQueue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use triad_domain::event::names;
use triad_domain::{ConsensusResult, EngineEvent, Phase, Question};
use uuid::Uuid;

/// Snapshot of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub prompt: String,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ConsensusResult>,
    /// `run.failed` reason, or `cancelled`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Events relayed so far
    pub events: usize,
}

impl SessionStatus {
    fn queued(id: String, prompt: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            prompt,
            phase: Phase::Queued,
            created_at: now,
            updated_at: now,
            finished_at: None,
            result: None,
            error: None,
            events: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// End outside the event flow, in ERROR or CANCELLED
    fn finish(&mut self, phase: Phase, error: impl Into<String>) {
        let now = Utc::now();
        self.phase = phase;
        self.error = Some(error.into());
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    fn observe(&mut self, event: &EngineEvent) {
        let now = Utc::now();
        self.events += 1;
        self.updated_at = now;
        match event {
            EngineEvent::PhaseTransition { phase } => {
                self.phase = *phase;
                if phase.is_terminal() {
                    self.finished_at = Some(now);
                }
            }
            EngineEvent::Result { result } => self.result = Some((**result).clone()),
            EngineEvent::Event { name, data } if name == names::RUN_FAILED => {
                self.error = data
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            EngineEvent::Event { name, .. } if name == names::RUN_CANCELLED => {
                self.error = Some("cancelled".to_string());
            }
            _ => {}
        }
    }
}

struct SessionEntry {
    status: SessionStatus,
    cancel: CancellationToken,
    launched: bool,
}

type Registry = Arc<Mutex<HashMap<String, SessionEntry>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Creates, runs and tracks consensus sessions
pub struct SessionManager {
    engine: ConsensusEngine,
    broadcaster: Arc<EventBroadcaster>,
    sessions: Registry,
}

impl SessionManager {
    pub fn new(engine: ConsensusEngine, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            engine,
            broadcaster,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Register a session in QUEUED and return its id
    pub fn create(&self, prompt: &str) -> Result<String, ConsensusError> {
        let question = Question::try_new(prompt)?;
        let id = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            status: SessionStatus::queued(id.clone(), question.into_content()),
            cancel: CancellationToken::new(),
            launched: false,
        };
        lock(&self.sessions).insert(id.clone(), entry);
        debug!(session_id = %id, "Session created");
        Ok(id)
    }

    /// Start the run of a queued session.
    ///
    /// Returns `Ok(false)` when the session is unknown, already launched or
    /// cancelled while queued.
    pub fn launch(&self, id: &str) -> Result<bool, ConsensusError> {
        let (prompt, cancel) = {
            let mut sessions = lock(&self.sessions);
            let Some(entry) = sessions.get_mut(id) else {
                return Ok(false);
            };
            if entry.launched || entry.status.is_finished() {
                return Ok(false);
            }
            entry.launched = true;
            (entry.status.prompt.clone(), entry.cancel.clone())
        };

        let stream = match self.engine.run_stream(&prompt, cancel) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Session could not start");
                if let Some(entry) = lock(&self.sessions).get_mut(id) {
                    entry.status.finish(Phase::Error, e.to_string());
                }
                return Err(e);
            }
        };
        info!(session_id = %id, "Session launched");
        tokio::spawn(relay(
            Arc::clone(&self.sessions),
            Arc::clone(&self.broadcaster),
            id.to_string(),
            stream,
        ));
        Ok(true)
    }

    /// Create and launch in one step
    pub fn start(&self, prompt: &str) -> Result<String, ConsensusError> {
        let id = self.create(prompt)?;
        self.launch(&id)?;
        Ok(id)
    }

    /// Follow a session's events; `None` for unknown sessions
    pub fn subscribe(&self, id: &str) -> Option<Arc<SubscriberQueue>> {
        lock(&self.sessions)
            .contains_key(id)
            .then(|| self.broadcaster.subscribe(id))
    }

    pub fn status(&self, id: &str) -> Option<SessionStatus> {
        lock(&self.sessions).get(id).map(|entry| entry.status.clone())
    }

    /// All sessions, oldest first
    pub fn list(&self) -> Vec<SessionStatus> {
        let mut all: Vec<SessionStatus> = lock(&self.sessions)
            .values()
            .map(|entry| entry.status.clone())
            .collect();
        all.sort_by_key(|status| status.created_at);
        all
    }

    /// Request cancellation; false if the session is unknown or finished.
    ///
    /// A session that was never launched moves straight to CANCELLED.
    pub fn cancel(&self, id: &str) -> bool {
        let mut sessions = lock(&self.sessions);
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };
        if entry.status.is_finished() {
            return false;
        }
        entry.cancel.cancel();
        if !entry.launched {
            entry.status.finish(Phase::Cancelled, "cancelled");
        }
        info!(session_id = %id, "Session cancellation requested");
        true
    }

    /// Drop finished sessions older than `ttl`; returns how many went
    pub fn purge_expired(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, entry| {
            let expired = entry.status.finished_at.is_some_and(|finished| {
                now.signed_duration_since(finished)
                    .to_std()
                    .is_ok_and(|elapsed| elapsed >= ttl)
            });
            !expired
        });
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        purged
    }

    pub fn active_count(&self) -> usize {
        lock(&self.sessions)
            .values()
            .filter(|entry| !entry.status.is_finished())
            .count()
    }
}

async fn relay(
    sessions: Registry,
    broadcaster: Arc<EventBroadcaster>,
    id: String,
    mut stream: EventStream,
) {
    while let Some(event) = stream.next_event().await {
        if let Some(entry) = lock(&sessions).get_mut(&id) {
            entry.status.observe(&event);
        }
        broadcaster.publish(&id, event.to_json());
    }

    let mut sessions = lock(&sessions);
    if let Some(entry) = sessions.get_mut(&id)
        && !entry.status.is_finished()
    {
        warn!(session_id = %id, "Event stream ended before a terminal phase");
        entry.status.finish(Phase::Error, "stream_closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ports::agent_executor::{AgentError, AgentExecutor, AgentRequest};
    use async_trait::async_trait;
    use triad_domain::AgentId;

    #[derive(Default)]
    struct Approver;

    #[async_trait]
    impl AgentExecutor for Approver {
        async fn invoke(&self, request: &AgentRequest) -> Result<String, AgentError> {
            Ok(match request.phase {
                Phase::Voting => "DECISION: APPROVE".to_string(),
                _ => "Looks reasonable.".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct Stalled;

    #[async_trait]
    impl AgentExecutor for Stalled {
        async fn invoke(&self, _request: &AgentRequest) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(AgentError::Failed("woke up".to_string()))
        }
    }

    fn manager<A: AgentExecutor + Default + 'static>() -> SessionManager {
        let roster = AgentId::ALL
            .iter()
            .map(|agent| (*agent, Arc::new(A::default()) as Arc<dyn AgentExecutor>))
            .collect();
        let engine = ConsensusEngine::new(roster, EngineConfig::default()).unwrap();
        SessionManager::new(engine, Arc::new(EventBroadcaster::new(256).unwrap()))
    }

    async fn wait_for<F: Fn(&SessionStatus) -> bool>(
        sessions: &SessionManager,
        id: &str,
        done: F,
    ) -> SessionStatus {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let status = sessions.status(id).unwrap();
                if done(&status) {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_relays_events_and_records_result() {
        let sessions = manager::<Approver>();
        let id = sessions.create("Ship it?").unwrap();
        assert_eq!(sessions.status(&id).unwrap().phase, Phase::Queued);

        let queue = sessions.subscribe(&id).unwrap();
        assert!(sessions.launch(&id).unwrap());
        assert!(!sessions.launch(&id).unwrap());

        let mut seen = Vec::new();
        loop {
            let payload = tokio::time::timeout(Duration::from_secs(5), queue.recv())
                .await
                .unwrap();
            let kind = payload["type"].as_str().unwrap().to_string();
            assert_eq!(payload["session_id"], id.as_str());
            seen.push(payload);
            if kind == "result" {
                break;
            }
        }
        assert_eq!(seen[0]["name"], names::RUN_STARTED);

        let status = sessions.status(&id).unwrap();
        assert_eq!(status.phase, Phase::Resolved);
        assert!(status.finished_at.is_some());
        assert_eq!(status.result.unwrap().exit_code, 0);
        assert_eq!(status.events, seen.len());
        assert_eq!(sessions.active_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_running_session() {
        let sessions = manager::<Stalled>();
        let id = sessions.start("Ship it?").unwrap();
        wait_for(&sessions, &id, |s| s.phase == Phase::Thinking).await;

        assert!(sessions.cancel(&id));
        let status = wait_for(&sessions, &id, SessionStatus::is_finished).await;
        assert_eq!(status.phase, Phase::Cancelled);
        assert_eq!(status.error.as_deref(), Some("cancelled"));
        assert!(status.result.is_none());
        assert!(!sessions.cancel(&id));
    }

    #[tokio::test]
    async fn test_cancel_before_launch() {
        let sessions = manager::<Approver>();
        let id = sessions.create("q").unwrap();
        assert!(sessions.cancel(&id));
        assert_eq!(sessions.status(&id).unwrap().phase, Phase::Cancelled);
        assert!(!sessions.cancel("missing"));
    }

    #[tokio::test]
    async fn test_purge_only_finished_sessions() {
        let sessions = manager::<Approver>();
        let finished = sessions.create("a").unwrap();
        sessions.cancel(&finished);
        let queued = sessions.create("b").unwrap();

        assert_eq!(sessions.purge_expired(Duration::from_secs(3600)), 0);
        assert_eq!(sessions.purge_expired(Duration::ZERO), 1);
        assert!(sessions.status(&finished).is_none());
        assert!(sessions.status(&queued).is_some());
        assert_eq!(sessions.list().len(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_finishes_session() {
        let sessions = manager::<Approver>();
        let id = sessions.create("Ship it?").unwrap();
        // Only reachable if the stored prompt no longer validates
        lock(&sessions.sessions)
            .get_mut(&id)
            .unwrap()
            .status
            .prompt = "   ".to_string();

        assert!(matches!(
            sessions.launch(&id),
            Err(ConsensusError::InvalidPrompt(_))
        ));
        let status = sessions.status(&id).unwrap();
        assert_eq!(status.phase, Phase::Error);
        assert!(status.error.is_some());
        assert!(status.finished_at.is_some());
        assert_eq!(sessions.active_count(), 0);
        assert!(!sessions.launch(&id).unwrap());
    }

    #[test]
    fn test_blank_prompt_rejected() {
        let sessions = manager::<Approver>();
        assert!(matches!(
            sessions.create(" "),
            Err(ConsensusError::InvalidPrompt(_))
        ));
        assert!(sessions.subscribe("missing").is_none());
    }
}
