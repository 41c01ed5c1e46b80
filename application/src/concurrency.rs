//! Bounded concurrency for outbound agent calls.
//!
//! [`ConcurrencyController`] hands out [`ConcurrencySlot`]s backed by a
//! semaphore. A slot is released when it is dropped, which covers normal
//! completion, errors and task cancellation alike. All counters live in one
//! struct behind one mutex, so a [`ConcurrencyMetrics`] snapshot is always
//! internally consistent.

use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConcurrencyError {
    #[error("Timed out after {waited:?} waiting for a concurrency slot")]
    Timeout { waited: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Concurrency controller closed")]
    Closed,
}

/// Snapshot of controller counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConcurrencyMetrics {
    /// Slots currently held (never above `max_concurrent`)
    pub active_count: usize,
    /// Callers currently waiting for a slot
    pub waiting_count: usize,
    pub total_acquired: u64,
    pub total_timeouts: u64,
    pub total_rate_limits: u64,
}

type SharedMetrics = Arc<Mutex<ConcurrencyMetrics>>;

fn lock(metrics: &Mutex<ConcurrencyMetrics>) -> MutexGuard<'_, ConcurrencyMetrics> {
    // Counters stay meaningful even if a holder panicked mid-update
    metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Limits how many agent calls run at once
#[derive(Debug)]
pub struct ConcurrencyController {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    metrics: SharedMetrics,
}

impl ConcurrencyController {
    pub fn new(max_concurrent: usize) -> Result<Self, ConcurrencyError> {
        if max_concurrent == 0 {
            return Err(ConcurrencyError::InvalidConfiguration(
                "max_concurrent must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            metrics: Arc::new(Mutex::new(ConcurrencyMetrics::default())),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Wait for a slot, giving up after `timeout` if one is set.
    ///
    /// A zero timeout still succeeds when a slot is free right away.
    pub async fn acquire(
        &self,
        timeout: Option<Duration>,
    ) -> Result<ConcurrencySlot, ConcurrencyError> {
        let started = Instant::now();
        let waiting = WaitingGuard::enter(Arc::clone(&self.metrics));
        let permit = Arc::clone(&self.semaphore).acquire_owned();

        let acquired = match timeout {
            Some(limit) => match tokio::time::timeout(limit, permit).await {
                Ok(result) => result,
                Err(_) => {
                    let waited = started.elapsed();
                    waiting.leave(|m| m.total_timeouts += 1);
                    warn!(?waited, "Timed out waiting for a concurrency slot");
                    return Err(ConcurrencyError::Timeout { waited });
                }
            },
            None => permit.await,
        };
        let permit = acquired.map_err(|_| ConcurrencyError::Closed)?;

        waiting.leave(|m| {
            m.active_count += 1;
            m.total_acquired += 1;
        });
        debug!(waited = ?started.elapsed(), "Acquired concurrency slot");

        Ok(ConcurrencySlot {
            metrics: Arc::clone(&self.metrics),
            _permit: permit,
        })
    }

    /// Run `fut` while holding a slot
    pub async fn run<F, T>(&self, timeout: Option<Duration>, fut: F) -> Result<T, ConcurrencyError>
    where
        F: Future<Output = T>,
    {
        let _slot = self.acquire(timeout).await?;
        Ok(fut.await)
    }

    /// Record that a provider reported a rate limit
    pub fn note_rate_limit(&self) {
        lock(&self.metrics).total_rate_limits += 1;
    }

    pub fn metrics(&self) -> ConcurrencyMetrics {
        *lock(&self.metrics)
    }
}

/// A held concurrency slot; released on drop
#[derive(Debug)]
pub struct ConcurrencySlot {
    metrics: SharedMetrics,
    // Dropped after `drop` runs, so `active_count` falls before the permit frees up
    _permit: OwnedSemaphorePermit,
}

impl Drop for ConcurrencySlot {
    fn drop(&mut self) {
        let mut metrics = lock(&self.metrics);
        metrics.active_count = metrics.active_count.saturating_sub(1);
    }
}

/// Keeps `waiting_count` balanced on every exit path, including
/// cancellation of the acquiring future.
struct WaitingGuard {
    metrics: SharedMetrics,
    armed: bool,
}

impl WaitingGuard {
    fn enter(metrics: SharedMetrics) -> Self {
        lock(&metrics).waiting_count += 1;
        Self {
            metrics,
            armed: true,
        }
    }

    /// Stop waiting and apply `update` under the same lock
    fn leave(mut self, update: impl FnOnce(&mut ConcurrencyMetrics)) {
        let mut metrics = lock(&self.metrics);
        metrics.waiting_count = metrics.waiting_count.saturating_sub(1);
        update(&mut metrics);
        self.armed = false;
    }
}

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut metrics = lock(&self.metrics);
            metrics.waiting_count = metrics.waiting_count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_timeout_scenario() {
        let controller = ConcurrencyController::new(1).unwrap();
        let holder = controller.acquire(None).await.unwrap();

        let err = controller
            .acquire(Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, ConcurrencyError::Timeout { .. }));

        let metrics = controller.metrics();
        assert_eq!(metrics.total_timeouts, 1);
        assert_eq!(metrics.total_acquired, 1);
        assert_eq!(metrics.active_count, 1);
        assert_eq!(metrics.waiting_count, 0);

        drop(holder);
        assert_eq!(controller.metrics().active_count, 0);
    }

    #[tokio::test]
    async fn test_active_never_exceeds_limit() {
        let controller = Arc::new(ConcurrencyController::new(2).unwrap());
        let peak = Arc::new(AtomicUsize::new(0));
        let mut join_set = JoinSet::new();

        for _ in 0..8 {
            let controller = Arc::clone(&controller);
            let peak = Arc::clone(&peak);
            join_set.spawn(async move {
                let inner = Arc::clone(&controller);
                controller
                    .run(None, async move {
                        let active = inner.metrics().active_count;
                        peak.fetch_max(active, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    })
                    .await
                    .unwrap();
            });
        }
        while let Some(result) = join_set.join_next().await {
            result.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        let metrics = controller.metrics();
        assert_eq!(metrics.active_count, 0);
        assert_eq!(metrics.waiting_count, 0);
        assert_eq!(metrics.total_acquired, 8);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_not_counted() {
        let controller = Arc::new(ConcurrencyController::new(1).unwrap());
        let holder = controller.acquire(None).await.unwrap();

        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.acquire(None).await.map(|_| ()) })
        };
        while controller.metrics().waiting_count == 0 {
            tokio::task::yield_now().await;
        }

        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(controller.metrics().waiting_count, 0);

        drop(holder);
        let metrics = controller.metrics();
        assert_eq!(metrics.active_count, 0);
        assert_eq!(metrics.total_acquired, 1);
    }

    #[tokio::test]
    async fn test_zero_timeout_with_free_slot() {
        let controller = ConcurrencyController::new(1).unwrap();
        let slot = controller.acquire(Some(Duration::ZERO)).await;
        assert!(slot.is_ok());
    }

    #[tokio::test]
    async fn test_slot_released_when_work_fails() {
        let controller = ConcurrencyController::new(1).unwrap();
        let result: Result<Result<(), &str>, _> =
            controller.run(None, async { Err("boom") }).await;
        assert!(result.unwrap().is_err());
        assert_eq!(controller.metrics().active_count, 0);
    }

    #[test]
    fn test_rate_limit_counter_and_validation() {
        assert!(ConcurrencyController::new(0).is_err());

        let controller = ConcurrencyController::new(3).unwrap();
        controller.note_rate_limit();
        controller.note_rate_limit();
        assert_eq!(controller.metrics().total_rate_limits, 2);
        assert_eq!(controller.max_concurrent(), 3);
    }
}
