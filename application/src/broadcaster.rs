//! Per-session publish/subscribe for engine events.
//!
//! Each subscriber owns a bounded [`SubscriberQueue`]. When a queue is full,
//! publishing evicts its oldest entry, so a slow subscriber loses old
//! events rather than slowing the publisher down. Subscribers must tolerate
//! such gaps; per-subscriber order is arrival order.

use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Version stamped on every published payload
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BroadcastError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Value>,
    dropped: u64,
}

/// Bounded drop-oldest FIFO owned by one subscriber
#[derive(Debug)]
pub struct SubscriberQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                dropped: 0,
            }),
            notify: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue, evicting the oldest entry when full. Returns whether an
    /// entry was evicted.
    fn push(&self, value: Value) -> bool {
        let evicted = {
            let mut state = self.state();
            let evicted = state.items.len() >= self.capacity;
            if evicted {
                state.items.pop_front();
                state.dropped += 1;
            }
            state.items.push_back(value);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    pub fn try_recv(&self) -> Option<Value> {
        self.state().items.pop_front()
    }

    /// Wait for the next payload
    pub async fn recv(&self) -> Value {
        loop {
            if let Some(value) = self.try_recv() {
                return value;
            }
            self.notify.notified().await;
        }
    }

    /// Take everything currently queued
    pub fn drain(&self) -> Vec<Value> {
        self.state().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of payloads evicted so far
    pub fn dropped(&self) -> u64 {
        self.state().dropped
    }
}

/// Fan-out hub keyed by session id
#[derive(Debug)]
pub struct EventBroadcaster {
    queue_maxsize: usize,
    sessions: Mutex<HashMap<String, Vec<Arc<SubscriberQueue>>>>,
}

impl EventBroadcaster {
    pub fn new(queue_maxsize: usize) -> Result<Self, BroadcastError> {
        if queue_maxsize == 0 {
            return Err(BroadcastError::InvalidConfiguration(
                "queue_maxsize must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            queue_maxsize,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Vec<Arc<SubscriberQueue>>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, session_id: &str) -> Arc<SubscriberQueue> {
        let queue = Arc::new(SubscriberQueue::new(self.queue_maxsize));
        self.sessions()
            .entry(session_id.to_string())
            .or_default()
            .push(Arc::clone(&queue));
        debug!(session_id, "Subscriber added");
        queue
    }

    /// Remove exactly `queue`; the session entry goes away with its last
    /// subscriber. Returns whether the queue was registered.
    pub fn unsubscribe(&self, session_id: &str, queue: &Arc<SubscriberQueue>) -> bool {
        let mut sessions = self.sessions();
        let Some(queues) = sessions.get_mut(session_id) else {
            return false;
        };
        let before = queues.len();
        queues.retain(|q| !Arc::ptr_eq(q, queue));
        let removed = queues.len() < before;
        if queues.is_empty() {
            sessions.remove(session_id);
        }
        if removed {
            debug!(session_id, "Subscriber removed");
        }
        removed
    }

    /// Stamp `payload` and enqueue it for every subscriber of the session.
    ///
    /// Returns the number of subscribers reached; zero subscribers is a
    /// no-op. Non-object payloads are wrapped under `"data"`.
    pub fn publish(&self, session_id: &str, payload: Value) -> usize {
        // Clone the queue list out so the registry lock is not held while enqueueing
        let queues = match self.sessions().get(session_id) {
            Some(queues) => queues.clone(),
            None => return 0,
        };

        let stamped = stamp(session_id, payload);
        let mut evicted = 0;
        for queue in &queues {
            if queue.push(stamped.clone()) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            trace!(session_id, evicted, "Dropped oldest events for slow subscribers");
        }
        queues.len()
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.sessions().get(session_id).map_or(0, Vec::len)
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    pub fn queue_maxsize(&self) -> usize {
        self.queue_maxsize
    }
}

fn stamp(session_id: &str, payload: Value) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("schema_version".to_string(), Value::from(SCHEMA_VERSION));
    map.insert("session_id".to_string(), Value::from(session_id));
    map.insert(
        "timestamp".to_string(),
        Value::from(chrono::Utc::now().to_rfc3339()),
    );
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn names(values: &[Value]) -> Vec<&str> {
        values.iter().filter_map(|v| v["name"].as_str()).collect()
    }

    #[test]
    fn test_drop_oldest_scenario() {
        let broadcaster = EventBroadcaster::new(2).unwrap();
        let queue = broadcaster.subscribe("s1");
        for name in ["A", "B", "C"] {
            broadcaster.publish("s1", json!({ "name": name }));
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(names(&queue.drain()), vec!["B", "C"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let broadcaster = EventBroadcaster::new(4).unwrap();
        assert_eq!(broadcaster.publish("nobody", json!({"name": "x"})), 0);
        assert_eq!(broadcaster.session_count(), 0);
    }

    #[test]
    fn test_stamped_metadata() {
        let broadcaster = EventBroadcaster::new(4).unwrap();
        let queue = broadcaster.subscribe("abc");
        broadcaster.publish("abc", json!({"type": "event"}));
        broadcaster.publish("abc", json!(42));

        let first = queue.try_recv().unwrap();
        assert_eq!(first["schema_version"], SCHEMA_VERSION);
        assert_eq!(first["session_id"], "abc");
        assert_eq!(first["type"], "event");
        let ts = first["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());

        let second = queue.try_recv().unwrap();
        assert_eq!(second["data"], 42);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_queue() {
        let broadcaster = EventBroadcaster::new(4).unwrap();
        let a = broadcaster.subscribe("s");
        let b = broadcaster.subscribe("s");
        assert_eq!(broadcaster.subscriber_count("s"), 2);

        assert!(broadcaster.unsubscribe("s", &a));
        assert!(!broadcaster.unsubscribe("s", &a));
        assert_eq!(broadcaster.publish("s", json!({"name": "x"})), 1);
        assert!(a.is_empty());
        assert_eq!(b.len(), 1);

        assert!(broadcaster.unsubscribe("s", &b));
        assert_eq!(broadcaster.session_count(), 0);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let broadcaster = EventBroadcaster::new(4).unwrap();
        let one = broadcaster.subscribe("one");
        let two = broadcaster.subscribe("two");
        broadcaster.publish("one", json!({"name": "x"}));
        assert_eq!(one.len(), 1);
        assert!(two.is_empty());
    }

    #[tokio::test]
    async fn test_recv_waits_for_publish() {
        let broadcaster = Arc::new(EventBroadcaster::new(4).unwrap());
        let queue = broadcaster.subscribe("s");

        let publisher = {
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                broadcaster.publish("s", json!({"name": "late"}));
            })
        };
        let value = tokio::time::timeout(Duration::from_secs(2), queue.recv())
            .await
            .unwrap();
        assert_eq!(value["name"], "late");
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_publishers_respect_capacity() {
        let broadcaster = Arc::new(EventBroadcaster::new(3).unwrap());
        let queue = broadcaster.subscribe("s");
        let mut handles = Vec::new();
        for i in 0..4 {
            let broadcaster = Arc::clone(&broadcaster);
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    broadcaster.publish("s", json!({"name": format!("{i}-{j}")}));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 97);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(EventBroadcaster::new(0).is_err());
    }
}
