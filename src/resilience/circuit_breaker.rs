//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure percentage >= threshold within the evaluation window
//!                (once the window holds at least `volume_threshold` calls)
//! Open → Half-Open: first call after the reset timeout
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global), each with its own lock
//! - Fail fast in Open state (the operation is never started)
//! - Single trial in Half-Open (prevents hammering recovering backend)
//! - Fixed evaluation window, restarted when it elapses and on every Closed entry
//! - Every transition bumps a generation; outcomes admitted under an older
//!   generation are discarded

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::BackendDescriptor;
use crate::observability::metrics;
use crate::resilience::timeouts::{with_timeout, TimedOut};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Tunables for one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Deadline for each executed operation.
    pub timeout: Duration,
    /// Failure percentage (1-100) that trips the breaker.
    pub error_threshold_percentage: u8,
    /// Time an open breaker waits before admitting a trial call.
    pub reset_timeout: Duration,
    /// Minimum calls in the window before the ratio is evaluated.
    pub volume_threshold: u32,
    /// Length of the fixed evaluation window.
    pub rolling_window: Duration,
}

impl From<&BackendDescriptor> for BreakerSettings {
    fn from(descriptor: &BackendDescriptor) -> Self {
        Self {
            timeout: descriptor.timeout,
            error_threshold_percentage: descriptor.error_threshold_percentage,
            reset_timeout: descriptor.reset_timeout,
            volume_threshold: descriptor.volume_threshold,
            rolling_window: descriptor.rolling_window,
        }
    }
}

/// Why a call through a breaker did not produce a value.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Short-circuited; the operation never ran.
    #[error("circuit open for backend `{0}`")]
    Open(String),

    /// The operation exceeded the backend timeout.
    #[error("backend `{backend}` timed out after {timeout:?}")]
    Timeout { backend: String, timeout: Duration },

    /// The operation ran and failed.
    #[error("backend call failed")]
    Backend(#[source] E),

    /// No breaker is registered under this name.
    #[error("no circuit breaker registered for backend `{0}`")]
    UnknownBackend(String),
}

/// Point-in-time view of a breaker for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub backend: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    window_started: Instant,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
    generation: u64,
}

/// Gates calls to one backend based on its recent outcomes.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, settings: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            name: name.into(),
            settings,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                window_started: now,
                last_failure: None,
                trial_in_flight: false,
                generation: 0,
            }),
        }
    }

    /// Current state as last recorded. An open breaker whose reset timeout
    /// has elapsed still reports `Open` until the next call arrives.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            backend: self.name.clone(),
            state: inner.state,
            failures: inner.failure_count,
            successes: inner.success_count,
        }
    }

    /// Force the breaker back to Closed with empty counters.
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if inner.state == CircuitState::Closed {
            inner.failure_count = 0;
            inner.success_count = 0;
            inner.window_started = now;
        } else {
            self.transition(&mut inner, CircuitState::Closed, now);
        }
    }

    /// Run `operation` if the breaker admits it.
    ///
    /// The operation is bounded by the backend timeout. Errors and timeouts
    /// count as failures; a short-circuit does not count at all.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(permit) = self.admit() else {
            tracing::debug!(backend = %self.name, "Circuit open, short-circuiting call");
            return Err(BreakerError::Open(self.name.clone()));
        };

        match with_timeout(self.settings.timeout, operation()).await {
            Ok(Ok(value)) => {
                permit.settle(Outcome::Success);
                Ok(value)
            }
            Ok(Err(e)) => {
                permit.settle(Outcome::Failure);
                Err(BreakerError::Backend(e))
            }
            Err(TimedOut(timeout)) => {
                tracing::warn!(backend = %self.name, timeout = ?timeout, "Backend call timed out");
                permit.settle(Outcome::Failure);
                Err(BreakerError::Timeout {
                    backend: self.name.clone(),
                    timeout,
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => {
                if now.duration_since(inner.window_started) >= self.settings.rolling_window {
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.window_started = now;
                }
                Some(Permit::new(self, inner.generation, false))
            }
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map_or(true, |at| now.duration_since(at) >= self.settings.reset_timeout);
                if !cooled_down {
                    return None;
                }
                self.transition(&mut inner, CircuitState::HalfOpen, now);
                inner.trial_in_flight = true;
                Some(Permit::new(self, inner.generation, true))
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                // Previous trial was cancelled before settling.
                inner.trial_in_flight = true;
                Some(Permit::new(self, inner.generation, true))
            }
        }
    }

    fn record(&self, generation: u64, outcome: Outcome) {
        let now = self.clock.now();
        let mut inner = self.lock();

        if inner.generation != generation {
            tracing::debug!(
                backend = %self.name,
                outcome = ?outcome,
                "Discarding outcome admitted before the last transition"
            );
            return;
        }

        match (inner.state, outcome) {
            (CircuitState::Closed, Outcome::Success) => {
                inner.success_count += 1;
            }
            (CircuitState::Closed, Outcome::Failure) => {
                inner.failure_count += 1;
                inner.last_failure = Some(now);
                if self.should_trip(&inner) {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
            (CircuitState::HalfOpen, Outcome::Success) => {
                self.transition(&mut inner, CircuitState::Closed, now);
            }
            (CircuitState::HalfOpen, Outcome::Failure) => {
                self.transition(&mut inner, CircuitState::Open, now);
            }
            // Nothing executes while open, and any transition into Open bumps
            // the generation.
            (CircuitState::Open, _) => {}
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn should_trip(&self, inner: &BreakerInner) -> bool {
        let total = inner.failure_count + inner.success_count;
        if total == 0 || total < self.settings.volume_threshold {
            return false;
        }
        u64::from(inner.failure_count) * 100
            >= u64::from(self.settings.error_threshold_percentage) * u64::from(total)
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.trial_in_flight = false;

        match to {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.window_started = now;
                inner.last_failure = None;
                tracing::info!(backend = %self.name, from = from.as_str(), "Circuit breaker closed");
            }
            CircuitState::Open => {
                inner.last_failure = Some(now);
                tracing::warn!(
                    backend = %self.name,
                    from = from.as_str(),
                    failures = inner.failure_count,
                    successes = inner.success_count,
                    reset_timeout = ?self.settings.reset_timeout,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(backend = %self.name, "Circuit breaker half-open, admitting trial call");
            }
        }

        metrics::record_breaker_transition(&self.name, from, to);
    }
}

/// Admission ticket for one executed call.
///
/// Dropping an unsettled trial permit (the caller's future was cancelled)
/// frees the half-open slot for the next caller.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, generation: u64, trial: bool) -> Self {
        Self {
            breaker,
            generation,
            trial,
            settled: false,
        }
    }

    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(self.generation, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial(self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings(volume_threshold: u32) -> BreakerSettings {
        BreakerSettings {
            timeout: Duration::from_secs(3),
            error_threshold_percentage: 50,
            reset_timeout: Duration::from_secs(30),
            volume_threshold,
            rolling_window: Duration::from_secs(10),
        }
    }

    fn breaker(volume_threshold: u32) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::new("order", settings(volume_threshold), clock.clone());
        (breaker, clock)
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<&'static str, BreakerError<&'static str>> {
        breaker.execute(|| async { Ok::<_, &'static str>("ok") }).await
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<&'static str, BreakerError<&'static str>> {
        breaker.execute(|| async { Err::<&'static str, _>("boom") }).await
    }

    #[tokio::test]
    async fn opens_once_failure_ratio_reaches_threshold() {
        let (breaker, _clock) = breaker(10);

        for _ in 0..4 {
            succeed(&breaker).await.unwrap();
        }
        for i in 0..6 {
            assert!(matches!(fail(&breaker).await, Err(BreakerError::Backend("boom"))));
            if i < 5 {
                assert_eq!(breaker.state(), CircuitState::Closed);
            }
        }

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn below_threshold_stays_closed() {
        let (breaker, _clock) = breaker(10);

        for _ in 0..6 {
            succeed(&breaker).await.unwrap();
        }
        for _ in 0..4 {
            let _ = fail(&breaker).await;
        }

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 4);
        assert_eq!(snapshot.successes, 6);
    }

    #[tokio::test]
    async fn open_breaker_never_runs_operation() {
        let (breaker, _clock) = breaker(1);
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        for _ in 0..5 {
            let result = breaker
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, &'static str>(())
                })
                .await;
            assert!(matches!(result, Err(BreakerError::Open(ref name)) if name == "order"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // Short-circuits are not counted as failures.
        assert_eq!(breaker.snapshot().failures, 1);
    }

    #[tokio::test]
    async fn successful_trial_closes_and_resets_counters() {
        let (breaker, clock) = breaker(1);
        let _ = fail(&breaker).await;

        clock.advance(Duration::from_secs(29));
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open(_))));

        clock.advance(Duration::from_secs(1));
        assert_eq!(succeed(&breaker).await.unwrap(), "ok");

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.successes, 0);
    }

    #[tokio::test]
    async fn failed_trial_reopens_with_fresh_timestamp() {
        let (breaker, clock) = breaker(1);
        let _ = fail(&breaker).await;

        clock.advance(Duration::from_secs(30));
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Backend(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        // The reset timeout now counts from the failed trial.
        clock.advance(Duration::from_secs(29));
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open(_))));

        clock.advance(Duration::from_secs(1));
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn concurrent_call_during_trial_is_short_circuited() {
        let (breaker, clock) = breaker(1);
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(30));

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let trial = breaker.execute(|| async move {
            let _ = gate.await;
            Ok::<_, &'static str>("recovered")
        });
        tokio::pin!(trial);

        assert!(futures_util::poll!(trial.as_mut()).is_pending());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open(_))));

        release.send(()).unwrap();
        assert_eq!(trial.await.unwrap(), "recovered");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_callers_admit_exactly_one_trial() {
        const RACERS: usize = 8;

        let clock = Arc::new(ManualClock::new());
        let breaker = Arc::new(CircuitBreaker::new("order", settings(1), clock.clone()));
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(30));

        let calls = Arc::new(AtomicU32::new(0));
        let rejected = Arc::new(AtomicU32::new(0));
        let start = Arc::new(tokio::sync::Barrier::new(RACERS));
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);

        let mut handles = Vec::new();
        for _ in 0..RACERS {
            let breaker = breaker.clone();
            let calls = calls.clone();
            let rejected = rejected.clone();
            let start = start.clone();
            let mut release = release_rx.clone();
            handles.push(tokio::spawn(async move {
                start.wait().await;
                let result = breaker
                    .execute(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = release.wait_for(|released| *released).await;
                        Ok::<_, &'static str>(())
                    })
                    .await;
                if matches!(result, Err(BreakerError::Open(_))) {
                    rejected.fetch_add(1, Ordering::SeqCst);
                }
                result.is_ok()
            }));
        }

        let all_but_one_rejected = tokio::time::timeout(Duration::from_secs(5), async {
            while rejected.load(Ordering::SeqCst) < (RACERS - 1) as u32 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        release_tx.send(true).unwrap();
        assert!(
            all_but_one_rejected.is_ok(),
            "more than one caller admitted: only {} rejected",
            rejected.load(Ordering::SeqCst)
        );

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure_and_late_result_is_dropped() {
        let (breaker, _clock) = breaker(1);
        let completed = Arc::new(AtomicU32::new(0));

        let done = completed.clone();
        let result = breaker
            .execute(|| async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await;

        assert!(matches!(
            result,
            Err(BreakerError::Timeout { ref backend, timeout }) if backend == "order" && timeout == Duration::from_secs(3)
        ));
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.snapshot().failures, 1);
    }

    #[tokio::test]
    async fn stale_outcome_does_not_touch_new_state() {
        let (breaker, _clock) = breaker(1);

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let slow = breaker.execute(|| async move {
            let _ = gate.await;
            Ok::<_, &'static str>("late")
        });
        tokio::pin!(slow);
        assert!(futures_util::poll!(slow.as_mut()).is_pending());

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        release.send(()).unwrap();
        assert_eq!(slow.await.unwrap(), "late");
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn cancelled_trial_frees_the_slot() {
        let (breaker, clock) = breaker(1);
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(30));

        {
            let trial = breaker.execute(|| std::future::pending::<Result<(), &'static str>>());
            tokio::pin!(trial);
            assert!(futures_util::poll!(trial.as_mut()).is_pending());
            assert_eq!(breaker.state(), CircuitState::HalfOpen);
        }

        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn evaluation_window_restarts_when_elapsed() {
        let (breaker, clock) = breaker(3);

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(10));

        succeed(&breaker).await.unwrap();
        succeed(&breaker).await.unwrap();
        let _ = fail(&breaker).await;

        // 1 of 3 in the new window; 3 of 5 overall would have tripped.
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.successes, 2);
    }

    #[tokio::test]
    async fn reset_closes_an_open_breaker() {
        let (breaker, _clock) = breaker(1);
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(succeed(&breaker).await.is_ok());
    }
}
