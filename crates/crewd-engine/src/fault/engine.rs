//! Fault handling entry point.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strum::IntoEnumIterator;
use uuid::Uuid;

use crewd_core::{ErrorCategory, ExecutionError};

use crate::TRACING_TARGET;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::Lifecycle;

use super::breaker::{BreakerRegistry, CircuitBreaker};
use super::classify::{InvokerError, classify};
use super::retry::RetryPolicy;

/// Callback invoked for every handled fault of a given category.
pub type CategoryCallback = Box<dyn Fn(&ExecutionError) + Send + Sync>;

/// What the caller should do after a handled fault.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryDecision {
    /// Whether another attempt is worthwhile.
    pub should_retry: bool,
    /// How long to wait before it, when retrying.
    pub retry_delay: Option<Duration>,
    /// The attempt number a retry would carry.
    pub next_attempt: u32,
}

/// Classifies invoker faults, records them, and decides on retries.
pub struct FaultEngine {
    lifecycle: Arc<Lifecycle>,
    policies: HashMap<ErrorCategory, RetryPolicy>,
    breakers: BreakerRegistry,
    callbacks: Mutex<HashMap<ErrorCategory, Vec<CategoryCallback>>>,
}

impl FaultEngine {
    /// Creates a fault engine with the default policy table and breaker
    /// defaults.
    pub fn new(
        lifecycle: Arc<Lifecycle>,
        failure_threshold: u32,
        recovery_timeout: Duration,
    ) -> Self {
        let policies = ErrorCategory::iter()
            .map(|category| (category, RetryPolicy::for_category(category)))
            .collect();

        Self {
            lifecycle,
            policies,
            breakers: BreakerRegistry::new(failure_threshold, recovery_timeout),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the retry policy for one category.
    pub fn set_policy(&mut self, category: ErrorCategory, policy: RetryPolicy) {
        self.policies.insert(category, policy);
    }

    /// The retry policy governing a category.
    pub fn policy_for(&self, category: ErrorCategory) -> RetryPolicy {
        self.policies
            .get(&category)
            .copied()
            .unwrap_or_else(|| RetryPolicy::for_category(category))
    }

    /// Registers a callback fired for every handled fault in `category`.
    /// Panics are caught and logged, never propagated.
    pub fn on_category(&self, category: ErrorCategory, callback: CategoryCallback) {
        let mut callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        callbacks.entry(category).or_default().push(callback);
    }

    /// Returns the circuit breaker guarding a named dependency.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers.get_or_create(name)
    }

    /// Force-resets breakers stuck open. Returns how many were reset.
    pub fn cleanup_circuit_breakers(&self) -> usize {
        self.breakers.cleanup()
    }

    /// Handles a fault raised while running `execution_id` on `attempt`
    /// (zero-based).
    ///
    /// Classifies the fault, records the failure on the execution with the
    /// serialized classification, runs category callbacks, and returns the
    /// retry decision. A record already out of the running state only logs;
    /// the decision is still produced.
    pub async fn handle_execution_error(
        &self,
        execution_id: Uuid,
        invoker_error: InvokerError,
        attempt: u32,
    ) -> EngineResult<RetryDecision> {
        let error = classify(invoker_error);

        tracing::error!(
            target: TRACING_TARGET,
            execution_id = %execution_id,
            category = %error.category,
            severity = %error.severity,
            code = %error.code,
            attempt,
            "Execution fault: {}",
            error.message
        );

        match self
            .lifecycle
            .fail_execution(execution_id, error.message.clone(), error.to_details())
            .await
        {
            Ok(_) => {}
            Err(EngineError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    execution_id = %execution_id,
                    from = %from,
                    "Fault on execution no longer running, failure not recorded"
                );
            }
            Err(other) => return Err(other),
        }

        self.run_callbacks(&error);

        let policy = self.policy_for(error.category);
        let should_retry = error.retry_recommended && attempt <= policy.max_retries;
        Ok(RetryDecision {
            should_retry,
            retry_delay: should_retry.then(|| policy.get_delay(attempt)),
            next_attempt: attempt + 1,
        })
    }

    fn run_callbacks(&self, error: &ExecutionError) {
        let callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        let Some(registered) = callbacks.get(&error.category) else {
            return;
        };

        for callback in registered {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(error))) {
                tracing::error!(
                    target: TRACING_TARGET,
                    category = %error.category,
                    panic = ?panic,
                    "Fault callback panicked"
                );
            }
        }
    }
}

impl std::fmt::Debug for FaultEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultEngine")
            .field("policies", &self.policies.len())
            .finish_non_exhaustive()
    }
}
