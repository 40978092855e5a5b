//! Execution service composition root.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crewd_graph::{StructuralValidator, ValidationConfig, WorkflowDefinition};

use super::TRACING_TARGET;
use super::config::EngineConfig;
use super::error::{EngineError, EngineResult};
use super::fault::{FaultEngine, InvokerError, RetryDecision};
use super::lifecycle::Lifecycle;
use super::mutex::ExecutionMutex;
use super::notify::NotificationSink;
use super::record::{ExecutionRecord, NewExecution};
use super::store::ExecutionStore;

/// Outcome of one maintenance sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Orphaned executions forced to timed out.
    pub timed_out: Vec<Uuid>,
    /// Circuit breakers force-reset.
    pub breakers_reset: usize,
}

/// Owns the validator, lifecycle, mutex, and fault engine.
///
/// Constructed once at startup by the application and passed to call sites;
/// there is no process-wide singleton.
pub struct ExecutionService {
    validator: StructuralValidator,
    lifecycle: Arc<Lifecycle>,
    mutex: ExecutionMutex,
    fault: FaultEngine,
    config: EngineConfig,
}

impl ExecutionService {
    /// Creates a service over a store with the given configuration.
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        validation: ValidationConfig,
        config: EngineConfig,
    ) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(store.clone()));
        Self::assemble(store, lifecycle, validation, config)
    }

    /// Creates a service with an explicit notification sink.
    pub fn with_sink(
        store: Arc<dyn ExecutionStore>,
        sink: Arc<dyn NotificationSink>,
        validation: ValidationConfig,
        config: EngineConfig,
    ) -> Self {
        let lifecycle = Arc::new(Lifecycle::with_sink(store.clone(), sink));
        Self::assemble(store, lifecycle, validation, config)
    }

    fn assemble(
        store: Arc<dyn ExecutionStore>,
        lifecycle: Arc<Lifecycle>,
        validation: ValidationConfig,
        config: EngineConfig,
    ) -> Self {
        Self {
            validator: StructuralValidator::new(validation),
            mutex: ExecutionMutex::new(store, config.orphan_timeout),
            fault: FaultEngine::new(
                lifecycle.clone(),
                config.breaker_failure_threshold,
                config.breaker_recovery_timeout,
            ),
            lifecycle,
            config,
        }
    }

    /// The lifecycle service.
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// The fault engine.
    pub fn fault(&self) -> &FaultEngine {
        &self.fault
    }

    /// The structural validator.
    pub fn validator(&self) -> &StructuralValidator {
        &self.validator
    }

    /// The per-graph execution mutex.
    pub fn mutex(&self) -> &ExecutionMutex {
        &self.mutex
    }

    /// Validates a definition and starts a run for it.
    ///
    /// Validation errors reject before any record is written. The graph is
    /// acquired under a reserved execution id before the pending record is
    /// committed, so a losing racer leaves no record behind; any failure
    /// after acquisition releases the graph.
    pub async fn start_run(&self, definition: &WorkflowDefinition) -> EngineResult<ExecutionRecord> {
        let report = self.validator.validate(definition)?;
        if !report.is_valid {
            tracing::warn!(
                target: TRACING_TARGET,
                graph_id = %definition.graph_id,
                errors = report.error_count(),
                "Rejecting run for invalid workflow graph"
            );
            return Err(EngineError::InvalidGraph(Box::new(report)));
        }

        let execution_id = Uuid::new_v4();
        self.mutex
            .validate_execution_start(definition.graph_id, execution_id)
            .await?;

        let created = self
            .lifecycle
            .create_execution(NewExecution::for_graph(definition.graph_id).with_id(execution_id))
            .await;
        let record = match created {
            Ok(record) => record,
            Err(error) => {
                self.mutex.release(definition.graph_id, execution_id).await;
                return Err(error);
            }
        };

        match self.lifecycle.start_execution(record.id).await {
            Ok(running) => Ok(running),
            Err(error) => {
                self.mutex.release(definition.graph_id, record.id).await;
                Err(error)
            }
        }
    }

    /// Restarts a failed or timed out run for another attempt.
    pub async fn retry_run(&self, execution_id: Uuid) -> EngineResult<ExecutionRecord> {
        let record = self.lifecycle.retry_execution(execution_id).await?;

        self.mutex
            .validate_execution_start(record.graph_id, record.id)
            .await?;
        match self.lifecycle.start_execution(record.id).await {
            Ok(running) => Ok(running),
            Err(error) => {
                self.mutex.release(record.graph_id, record.id).await;
                Err(error)
            }
        }
    }

    /// Completes a run and releases its graph.
    pub async fn complete_run(
        &self,
        execution_id: Uuid,
        result_data: serde_json::Value,
    ) -> EngineResult<ExecutionRecord> {
        let record = self.lifecycle.get_execution(execution_id).await?;
        let outcome = self
            .lifecycle
            .complete_execution(execution_id, result_data)
            .await;
        self.mutex.release(record.graph_id, execution_id).await;
        outcome
    }

    /// Records an invoker fault on a run and releases its graph.
    ///
    /// The lock is released whether or not a retry is recommended; a retry
    /// goes back through [`ExecutionService::retry_run`] and re-acquires.
    pub async fn fail_run(
        &self,
        execution_id: Uuid,
        error: InvokerError,
        attempt: u32,
    ) -> EngineResult<RetryDecision> {
        let record = self.lifecycle.get_execution(execution_id).await?;
        let decision = self
            .fault
            .handle_execution_error(execution_id, error, attempt)
            .await;
        self.mutex.release(record.graph_id, execution_id).await;
        decision
    }

    /// Cancels a run and releases its graph.
    pub async fn cancel_run(&self, execution_id: Uuid) -> EngineResult<ExecutionRecord> {
        let record = self.lifecycle.get_execution(execution_id).await?;
        let outcome = self.lifecycle.cancel_execution(execution_id).await;
        self.mutex.release(record.graph_id, execution_id).await;
        outcome
    }

    /// Runs one maintenance sweep: orphaned executions and stuck breakers.
    pub async fn run_sweep(&self) -> EngineResult<SweepReport> {
        let timed_out = self.mutex.cleanup_orphaned_locks(&self.lifecycle).await?;
        let breakers_reset = self.fault.cleanup_circuit_breakers();

        if !timed_out.is_empty() || breakers_reset > 0 {
            tracing::info!(
                target: TRACING_TARGET,
                timed_out = timed_out.len(),
                breakers_reset,
                "Maintenance sweep finished"
            );
        }
        Ok(SweepReport {
            timed_out,
            breakers_reset,
        })
    }

    /// Spawns the periodic maintenance sweep task.
    ///
    /// The task runs until its handle is aborted; sweep failures are logged
    /// and the loop continues.
    pub fn spawn_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it.
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(error) = service.run_sweep().await {
                    tracing::error!(
                        target: TRACING_TARGET,
                        error = %error,
                        "Maintenance sweep failed"
                    );
                }
            }
        })
    }
}

impl std::fmt::Debug for ExecutionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
