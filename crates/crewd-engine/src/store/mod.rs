//! Authoritative execution store collaborator.
//!
//! Persistence mechanics are out of scope for this crate; the engine talks
//! to whatever backs execution records through the [`ExecutionStore`] trait.
//! An in-memory implementation ships in [`memory`] for tests and
//! single-process deployments.

mod memory;

use async_trait::async_trait;
use jiff::Timestamp;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;

use super::record::{ExecutionRecord, NewExecution, UpdateExecution};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the authoritative store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A query or commit failed.
    #[error("store query failed: {0}")]
    Query(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Query and commit surface for execution records.
///
/// The engine treats every call as potentially blocking I/O. Reads are used
/// to reconcile in-memory state across worker processes, so implementations
/// must serve them from the authoritative source rather than a cache.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Inserts a new pending execution and returns the stored record.
    async fn insert_execution(&self, new: NewExecution) -> StoreResult<ExecutionRecord>;

    /// Finds an execution by id.
    async fn find_execution(&self, id: Uuid) -> StoreResult<Option<ExecutionRecord>>;

    /// Applies a change set to an execution.
    ///
    /// Returns `None` if no record exists for the id.
    async fn update_execution(
        &self,
        id: Uuid,
        update: UpdateExecution,
    ) -> StoreResult<Option<ExecutionRecord>>;

    /// Returns the most recently created active (pending or running)
    /// execution for a graph, if any. `exclude` filters out the caller's
    /// own record when it is already persisted.
    async fn latest_active_for_graph(
        &self,
        graph_id: Uuid,
        exclude: Option<Uuid>,
    ) -> StoreResult<Option<ExecutionRecord>>;

    /// Lists active executions whose activity anchor is older than `cutoff`.
    async fn list_active_before(&self, cutoff: Timestamp) -> StoreResult<Vec<ExecutionRecord>>;
}
