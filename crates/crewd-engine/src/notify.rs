//! Lifecycle event notification collaborator.

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;
use uuid::Uuid;

use crewd_core::BoxedError;

use super::TRACING_TARGET;
use super::record::ExecutionRecord;
use super::status::ExecutionStatus;

/// A lifecycle event emitted after a successful status transition.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Execution the event belongs to.
    pub execution_id: Uuid,
    /// Graph the execution belongs to.
    pub graph_id: Uuid,
    /// Status after the transition.
    pub status: ExecutionStatus,
    /// Progress after the transition.
    pub progress_percentage: f32,
    /// When the event was emitted.
    pub occurred_at: Timestamp,
}

impl LifecycleEvent {
    /// Builds an event from a freshly committed record.
    pub fn from_record(record: &ExecutionRecord) -> Self {
        Self {
            execution_id: record.id,
            graph_id: record.graph_id,
            status: record.status,
            progress_percentage: record.progress_percentage,
            occurred_at: Timestamp::now(),
        }
    }
}

/// Receives lifecycle events for external broadcast.
///
/// Delivery is fire-and-forget: the lifecycle logs sink failures and moves
/// on, a broken sink must never abort a transition.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one event.
    async fn notify(&self, event: LifecycleEvent) -> Result<(), BoxedError>;
}

/// Sink that emits events as tracing records.
///
/// The default sink when no transport is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, event: LifecycleEvent) -> Result<(), BoxedError> {
        tracing::debug!(
            target: TRACING_TARGET,
            execution_id = %event.execution_id,
            graph_id = %event.graph_id,
            status = %event.status,
            progress = event.progress_percentage,
            "Lifecycle event"
        );
        Ok(())
    }
}
