//! Execution record model.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::ExecutionStatus;

/// One run attempt of a workflow graph.
///
/// Owned by the lifecycle service; everything else reads records and requests
/// transitions instead of mutating them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique execution identifier.
    pub id: Uuid,
    /// The workflow graph this run belongs to.
    pub graph_id: Uuid,
    /// Current lifecycle status.
    pub status: ExecutionStatus,
    /// Scheduling priority; larger runs first. Default 0.
    pub priority: i32,
    /// Progress in percent, 0..=100.
    pub progress_percentage: f32,
    /// When execution entered `Running` for the first time.
    pub started_at: Option<Timestamp>,
    /// When execution finished.
    pub completed_at: Option<Timestamp>,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: Option<f64>,
    /// Error summary if the run failed.
    pub error_message: Option<String>,
    /// Classified error detail payload if the run failed.
    pub error_details: Option<serde_json::Value>,
    /// Result payload if the run completed.
    pub result_data: Option<serde_json::Value>,
    /// When the run was created.
    pub created_at: Timestamp,
}

impl ExecutionRecord {
    /// Returns whether the run is still active (pending or running).
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Timestamp used to judge staleness: start time, or creation time for
    /// runs that never started.
    pub fn activity_anchor(&self) -> Timestamp {
        self.started_at.unwrap_or(self.created_at)
    }
}

/// Data for creating a new execution.
#[derive(Debug, Clone, Default)]
pub struct NewExecution {
    /// Explicit execution id; a random one is assigned when absent.
    pub id: Option<Uuid>,
    /// Graph the run belongs to (required).
    pub graph_id: Uuid,
    /// Scheduling priority.
    pub priority: Option<i32>,
}

impl NewExecution {
    /// Creates insert data for a graph with default priority.
    pub fn for_graph(graph_id: Uuid) -> Self {
        Self {
            id: None,
            graph_id,
            priority: None,
        }
    }

    /// Pins the execution id, for callers that reserve it up front.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Materializes a pending record.
    pub fn into_record(self) -> ExecutionRecord {
        ExecutionRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            graph_id: self.graph_id,
            status: ExecutionStatus::Pending,
            priority: self.priority.unwrap_or(0),
            progress_percentage: 0.0,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
            error_message: None,
            error_details: None,
            result_data: None,
            created_at: Timestamp::now(),
        }
    }
}

/// Data for updating an execution.
///
/// `None` leaves a field untouched; the nested options express setting a
/// nullable field to a value.
#[derive(Debug, Clone, Default)]
pub struct UpdateExecution {
    /// New lifecycle status.
    pub status: Option<ExecutionStatus>,
    /// New progress percentage.
    pub progress_percentage: Option<f32>,
    /// Start timestamp.
    pub started_at: Option<Option<Timestamp>>,
    /// Completion timestamp.
    pub completed_at: Option<Option<Timestamp>>,
    /// Run duration in seconds.
    pub duration_seconds: Option<Option<f64>>,
    /// Error summary.
    pub error_message: Option<Option<String>>,
    /// Error detail payload.
    pub error_details: Option<Option<serde_json::Value>>,
    /// Result payload.
    pub result_data: Option<Option<serde_json::Value>>,
}

impl UpdateExecution {
    /// Applies this change set onto a record.
    pub fn apply_to(&self, record: &mut ExecutionRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(progress) = self.progress_percentage {
            record.progress_percentage = progress.clamp(0.0, 100.0);
        }
        if let Some(started_at) = self.started_at {
            record.started_at = started_at;
        }
        if let Some(completed_at) = self.completed_at {
            record.completed_at = completed_at;
        }
        if let Some(duration) = self.duration_seconds {
            record.duration_seconds = duration;
        }
        if let Some(ref message) = self.error_message {
            record.error_message = message.clone();
        }
        if let Some(ref details) = self.error_details {
            record.error_details = details.clone();
        }
        if let Some(ref result) = self.result_data {
            record.result_data = result.clone();
        }
    }
}
