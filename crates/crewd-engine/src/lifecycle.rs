//! Execution lifecycle state machine.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use jiff::Timestamp;
use uuid::Uuid;

use super::TRACING_TARGET;
use super::error::{EngineError, EngineResult};
use super::notify::{LifecycleEvent, NotificationSink, TracingSink};
use super::record::{ExecutionRecord, NewExecution, UpdateExecution};
use super::status::ExecutionStatus;
use super::store::ExecutionStore;

/// Callback invoked after a successful transition into a given status.
pub type StatusCallback = Box<dyn Fn(&ExecutionRecord) + Send + Sync>;

/// Optional payloads accompanying a status change.
#[derive(Debug, Default)]
pub struct StatusChange {
    /// Result payload, stored when entering `Completed`.
    pub result_data: Option<serde_json::Value>,
    /// Error summary, stored when entering `Failed`.
    pub error_message: Option<String>,
    /// Error detail payload, stored when entering `Failed`.
    pub error_details: Option<serde_json::Value>,
}

/// Outcome buckets of a bulk status update.
///
/// The buckets are disjoint; partial failure never raises.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Executions that transitioned.
    pub updated: Vec<Uuid>,
    /// Executions whose transition was invalid and skipped.
    pub skipped: Vec<Uuid>,
    /// Executions that were not found or whose commit failed.
    pub failed: Vec<Uuid>,
}

/// Owns execution records and enforces the status transition table.
///
/// All record mutation flows through [`Lifecycle::update_status`]; the mutex
/// and fault engine operate on top of it.
pub struct Lifecycle {
    store: Arc<dyn ExecutionStore>,
    sink: Arc<dyn NotificationSink>,
    callbacks: Mutex<HashMap<ExecutionStatus, Vec<StatusCallback>>>,
}

impl Lifecycle {
    /// Creates a lifecycle service over a store, notifying via tracing only.
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self::with_sink(store, Arc::new(TracingSink))
    }

    /// Creates a lifecycle service with an explicit notification sink.
    pub fn with_sink(store: Arc<dyn ExecutionStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            sink,
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a callback fired after every successful transition into
    /// `status`. Callback panics are caught and logged, never propagated.
    pub fn on_status(&self, status: ExecutionStatus, callback: StatusCallback) {
        let mut callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        callbacks.entry(status).or_default().push(callback);
    }

    /// Creates a new pending execution.
    pub async fn create_execution(&self, new: NewExecution) -> EngineResult<ExecutionRecord> {
        let record = self.store.insert_execution(new).await?;

        tracing::info!(
            target: TRACING_TARGET,
            execution_id = %record.id,
            graph_id = %record.graph_id,
            "Execution created"
        );
        self.emit(&record).await;
        Ok(record)
    }

    /// Loads an execution or fails with `ExecutionNotFound`.
    pub async fn get_execution(&self, id: Uuid) -> EngineResult<ExecutionRecord> {
        self.store
            .find_execution(id)
            .await?
            .ok_or(EngineError::ExecutionNotFound { execution_id: id })
    }

    /// Returns the most recent active execution for a graph, if any.
    pub async fn active_execution_for_graph(
        &self,
        graph_id: Uuid,
    ) -> EngineResult<Option<ExecutionRecord>> {
        Ok(self.store.latest_active_for_graph(graph_id, None).await?)
    }

    /// Transitions an execution to a new status.
    ///
    /// Rejects transitions outside the table without mutating anything.
    /// Entering `Running` for the first time stamps `started_at`; entering
    /// any finished status stamps `completed_at` and derives the duration,
    /// idempotently; entering `Completed` with result data stores it and
    /// sets progress to 100; entering `Failed` stores the error fields.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: ExecutionStatus,
        change: StatusChange,
    ) -> EngineResult<ExecutionRecord> {
        let record = self.get_execution(id).await?;

        if !record.status.can_transition_to(new_status) {
            return Err(EngineError::InvalidTransition {
                execution_id: id,
                from: record.status,
                to: new_status,
            });
        }

        let update = build_update(&record, new_status, change);
        let committed = self
            .store
            .update_execution(id, update)
            .await?
            .ok_or(EngineError::ExecutionNotFound { execution_id: id })?;

        tracing::info!(
            target: TRACING_TARGET,
            execution_id = %id,
            from = %record.status,
            to = %new_status,
            "Execution status updated"
        );

        self.run_callbacks(&committed);
        self.emit(&committed).await;
        Ok(committed)
    }

    /// Applies one status to many executions.
    ///
    /// Invalid transitions are skipped, missing records and store failures
    /// are collected; partial failure never raises.
    pub async fn bulk_update_status(
        &self,
        ids: &[Uuid],
        new_status: ExecutionStatus,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for &id in ids {
            match self
                .update_status(id, new_status, StatusChange::default())
                .await
            {
                Ok(_) => outcome.updated.push(id),
                Err(EngineError::InvalidTransition { .. }) => outcome.skipped.push(id),
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        execution_id = %id,
                        error = %error,
                        "Bulk status update failed for execution"
                    );
                    outcome.failed.push(id);
                }
            }
        }

        outcome
    }

    /// Marks a run as started.
    pub async fn start_execution(&self, id: Uuid) -> EngineResult<ExecutionRecord> {
        self.update_status(id, ExecutionStatus::Running, StatusChange::default())
            .await
    }

    /// Marks a run as completed with a result payload.
    pub async fn complete_execution(
        &self,
        id: Uuid,
        result_data: serde_json::Value,
    ) -> EngineResult<ExecutionRecord> {
        self.update_status(
            id,
            ExecutionStatus::Completed,
            StatusChange {
                result_data: Some(result_data),
                ..Default::default()
            },
        )
        .await
    }

    /// Marks a run as failed with error details.
    pub async fn fail_execution(
        &self,
        id: Uuid,
        error_message: impl Into<String>,
        error_details: serde_json::Value,
    ) -> EngineResult<ExecutionRecord> {
        self.update_status(
            id,
            ExecutionStatus::Failed,
            StatusChange {
                error_message: Some(error_message.into()),
                error_details: Some(error_details),
                ..Default::default()
            },
        )
        .await
    }

    /// Marks a run as cancelled. Cancellation only records intent; stopping
    /// in-flight work belongs to the execution collaborator.
    pub async fn cancel_execution(&self, id: Uuid) -> EngineResult<ExecutionRecord> {
        self.update_status(id, ExecutionStatus::Cancelled, StatusChange::default())
            .await
    }

    /// Marks a run as timed out.
    pub async fn timeout_execution(&self, id: Uuid) -> EngineResult<ExecutionRecord> {
        self.update_status(id, ExecutionStatus::TimedOut, StatusChange::default())
            .await
    }

    /// Returns a failed or timed out run to pending for a retry attempt.
    pub async fn retry_execution(&self, id: Uuid) -> EngineResult<ExecutionRecord> {
        self.update_status(id, ExecutionStatus::Pending, StatusChange::default())
            .await
    }

    /// Updates run progress, clamped to 0..=100.
    pub async fn update_progress(&self, id: Uuid, progress: f32) -> EngineResult<ExecutionRecord> {
        // Ensure the record exists before committing the change.
        self.get_execution(id).await?;

        let committed = self
            .store
            .update_execution(
                id,
                UpdateExecution {
                    progress_percentage: Some(progress),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(EngineError::ExecutionNotFound { execution_id: id })?;

        self.emit(&committed).await;
        Ok(committed)
    }

    fn run_callbacks(&self, record: &ExecutionRecord) {
        let callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        let Some(registered) = callbacks.get(&record.status) else {
            return;
        };

        for callback in registered {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(record))) {
                tracing::error!(
                    target: TRACING_TARGET,
                    execution_id = %record.id,
                    status = %record.status,
                    panic = ?panic,
                    "Status callback panicked"
                );
            }
        }
    }

    async fn emit(&self, record: &ExecutionRecord) {
        let event = LifecycleEvent::from_record(record);
        if let Err(error) = self.sink.notify(event).await {
            tracing::warn!(
                target: TRACING_TARGET,
                execution_id = %record.id,
                error = %error,
                "Notification sink failed"
            );
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle").finish_non_exhaustive()
    }
}

/// Derives the change set for an accepted transition.
fn build_update(
    record: &ExecutionRecord,
    new_status: ExecutionStatus,
    change: StatusChange,
) -> UpdateExecution {
    let now = Timestamp::now();
    let mut update = UpdateExecution {
        status: Some(new_status),
        ..Default::default()
    };

    if new_status == ExecutionStatus::Running && record.started_at.is_none() {
        update.started_at = Some(Some(now));
    }

    if new_status.is_finished() && record.completed_at.is_none() {
        update.completed_at = Some(Some(now));
        if let Some(started_at) = record.started_at {
            let duration = now.duration_since(started_at).as_secs_f64();
            update.duration_seconds = Some(Some(duration.max(0.0)));
        }
    }

    if new_status == ExecutionStatus::Completed {
        if let Some(result_data) = change.result_data {
            update.result_data = Some(Some(result_data));
            update.progress_percentage = Some(100.0);
        }
    }

    if new_status == ExecutionStatus::Failed {
        if let Some(message) = change.error_message {
            update.error_message = Some(Some(message));
        }
        if let Some(details) = change.error_details {
            update.error_details = Some(Some(details));
        }
    }

    update
}
