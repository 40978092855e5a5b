//! Engine error types.

use jiff::Timestamp;
use thiserror::Error;
use uuid::Uuid;

use crewd_graph::{GraphError, ValidationResult};

use super::status::ExecutionStatus;
use super::store::StoreError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while scheduling or tracking executions.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No execution record exists for the given id.
    #[error("execution {execution_id} not found")]
    ExecutionNotFound {
        /// The unknown execution id.
        execution_id: Uuid,
    },

    /// The requested status change is not in the transition table.
    #[error("invalid transition for execution {execution_id}: {from} -> {to}")]
    InvalidTransition {
        /// Execution being transitioned.
        execution_id: Uuid,
        /// Current status.
        from: ExecutionStatus,
        /// Requested status.
        to: ExecutionStatus,
    },

    /// Another execution already holds the graph.
    #[error("graph {graph_id} already has active execution {blocking_execution_id}")]
    ConcurrentExecution {
        /// The contended graph.
        graph_id: Uuid,
        /// The execution currently holding the graph.
        blocking_execution_id: Uuid,
        /// When the blocking execution started, if it did.
        started_at: Option<Timestamp>,
    },

    /// The workflow definition failed structural validation.
    #[error("workflow graph failed validation with {} errors", .0.metrics.error_count)]
    InvalidGraph(Box<ValidationResult>),

    /// The workflow definition could not be processed at all.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The authoritative store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
