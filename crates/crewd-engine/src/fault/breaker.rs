//! Circuit breakers for external dependencies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use strum::Display;

use crewd_core::ExecutionError;

use crate::TRACING_TARGET;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BreakerState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls fail fast until the recovery timeout elapses.
    Open,
    /// One probe call is allowed through.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Fault-isolation guard around one named dependency.
///
/// Closed passes calls through counting consecutive failures; at the
/// threshold it opens and fast-fails everything until the recovery timeout
/// has elapsed since the last failure, then lets one probe through half-open.
/// A successful probe closes the breaker, a failed one reopens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker for a named dependency.
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure_at: None,
                opened_at: None,
            }),
        }
    }

    /// Name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// How long the breaker has been open, if it is.
    pub fn open_for(&self) -> Option<Duration> {
        let inner = self.lock();
        match inner.state {
            BreakerState::Open => inner.opened_at.map(|at| at.elapsed()),
            _ => None,
        }
    }

    /// Wraps a call to the dependency.
    ///
    /// While open, calls are rejected with `external_service_unavailable`
    /// without invoking the operation.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, ExecutionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ExecutionError>>,
    {
        self.admit()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_failure();
                Err(error)
            }
        }
    }

    /// Force-resets the breaker to closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure_at = None;
        inner.opened_at = None;
    }

    fn admit(&self) -> Result<(), ExecutionError> {
        let mut inner = self.lock();
        if inner.state != BreakerState::Open {
            return Ok(());
        }

        let recovered = inner
            .last_failure_at
            .is_some_and(|at| at.elapsed() >= self.recovery_timeout);
        if recovered {
            inner.state = BreakerState::HalfOpen;
            tracing::info!(
                target: TRACING_TARGET,
                breaker = %self.name,
                "Circuit breaker half-open, allowing probe call"
            );
            Ok(())
        } else {
            Err(ExecutionError::external_service_unavailable(&self.name))
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!(
                target: TRACING_TARGET,
                breaker = %self.name,
                "Circuit breaker closed"
            );
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.failure_count += 1;
        inner.last_failure_at = Some(now);

        let should_open = inner.state == BreakerState::HalfOpen
            || inner.failure_count >= self.failure_threshold;
        if should_open && inner.state != BreakerState::Open {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(now);
            tracing::warn!(
                target: TRACING_TARGET,
                breaker = %self.name,
                failure_count = inner.failure_count,
                "Circuit breaker opened"
            );
        } else if inner.state == BreakerState::Open {
            inner.opened_at.get_or_insert(now);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lazily created breakers keyed by dependency name.
#[derive(Debug)]
pub struct BreakerRegistry {
    failure_threshold: u32,
    recovery_timeout: Duration,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Creates a registry with shared defaults for new breakers.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker for a dependency, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        breakers
            .entry(name.to_owned())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name,
                    self.failure_threshold,
                    self.recovery_timeout,
                ))
            })
            .clone()
    }

    /// Force-resets breakers that have been open past twice the recovery
    /// timeout. Returns how many were reset.
    pub fn cleanup(&self) -> usize {
        let stuck_after = self.recovery_timeout * 2;
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        let mut reset = 0;

        for breaker in breakers.values() {
            if breaker.open_for().is_some_and(|open| open > stuck_after) {
                tracing::warn!(
                    target: TRACING_TARGET,
                    breaker = %breaker.name(),
                    "Force-resetting stuck circuit breaker"
                );
                breaker.reset();
                reset += 1;
            }
        }

        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails() -> impl Future<Output = Result<(), ExecutionError>> {
        async { Err(ExecutionError::external_service("502")) }
    }

    fn succeeds() -> impl Future<Output = Result<u32, ExecutionError>> {
        async { Ok(7) }
    }

    #[tokio::test]
    async fn test_threshold_opens_and_rejects_without_calling() {
        let breaker = CircuitBreaker::new("inference", 2, Duration::from_secs(60));

        assert!(breaker.call(|| fails()).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.call(|| fails()).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);

        // The wrapped operation must not run while open.
        let mut invoked = false;
        let result = breaker
            .call(|| {
                invoked = true;
                succeeds()
            })
            .await;
        assert!(!invoked);
        let error = result.unwrap_err();
        assert_eq!(error.code, "external_service_unavailable");
    }

    #[tokio::test]
    async fn test_recovery_probe_closes_on_success() {
        let breaker = CircuitBreaker::new("inference", 2, Duration::from_millis(10));
        breaker.call(|| fails()).await.ok();
        breaker.call(|| fails()).await.ok();
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = breaker.call(|| succeeds()).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let breaker = CircuitBreaker::new("inference", 1, Duration::from_millis(10));
        breaker.call(|| fails()).await.ok();
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        breaker.call(|| fails()).await.ok();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_registry_reuses_breakers_and_cleans_up_stuck_ones() {
        let registry = BreakerRegistry::new(1, Duration::from_millis(1));
        let first = registry.get_or_create("search");
        let again = registry.get_or_create("search");
        assert!(Arc::ptr_eq(&first, &again));

        first.call(|| fails()).await.ok();
        assert_eq!(first.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(registry.cleanup(), 1);
        assert_eq!(first.state(), BreakerState::Closed);
    }
}
