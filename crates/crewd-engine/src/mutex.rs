//! Per-graph execution mutex.
//!
//! One graph runs at most once at a time. The fast path is an in-process
//! lock table; the authoritative store is the source of truth across worker
//! processes, so every admission decision reconciles against it.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::TRACING_TARGET;
use super::error::{EngineError, EngineResult};
use super::lifecycle::Lifecycle;
use super::store::ExecutionStore;

/// An in-process lock held on behalf of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    /// Execution holding the graph.
    pub execution_id: Uuid,
    /// When the lock was taken.
    pub acquired_at: Timestamp,
}

/// The execution blocking an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocker {
    /// Execution currently holding the graph.
    pub execution_id: Uuid,
    /// When it started running, if it has.
    pub started_at: Option<Timestamp>,
}

/// Admission decision for a graph.
#[derive(Debug, Clone, Copy)]
enum Gate {
    /// The graph is free.
    Clear,
    /// The graph is held; the blocker when it is known.
    Blocked(Option<Blocker>),
}

/// Guards each workflow graph against concurrent runs.
///
/// The lock table is advisory and process-local; [`ExecutionMutex::can_start`]
/// always double-checks the store so that runs started by other processes are
/// honored. Store failures fail safe: admission is denied rather than risking
/// a double run.
pub struct ExecutionMutex {
    store: Arc<dyn ExecutionStore>,
    locks: Mutex<HashMap<Uuid, LockEntry>>,
    /// Active records and lock entries idle past this are considered orphaned.
    orphan_timeout: SignedDuration,
}

impl ExecutionMutex {
    /// Creates a mutex over the given store.
    pub fn new(store: Arc<dyn ExecutionStore>, orphan_timeout: SignedDuration) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            orphan_timeout,
        }
    }

    /// Returns whether a run may start for `graph_id`, along with the
    /// blocker when it is denied and known.
    pub async fn can_start(&self, graph_id: Uuid) -> (bool, Option<Blocker>) {
        let mut locks = self.locks.lock().await;
        match self.check(&mut locks, graph_id, None).await {
            Gate::Clear => (true, None),
            Gate::Blocked(blocker) => (false, blocker),
        }
    }

    /// Attempts to take the graph for `execution_id`.
    ///
    /// The admission check and the lock insert happen under one table lock,
    /// so two local racers cannot both win.
    pub async fn try_acquire(
        &self,
        graph_id: Uuid,
        execution_id: Uuid,
    ) -> (bool, Option<Blocker>) {
        let mut locks = self.locks.lock().await;
        match self.check(&mut locks, graph_id, Some(execution_id)).await {
            Gate::Clear => {
                locks.insert(
                    graph_id,
                    LockEntry {
                        execution_id,
                        acquired_at: Timestamp::now(),
                    },
                );
                tracing::debug!(
                    target: TRACING_TARGET,
                    graph_id = %graph_id,
                    execution_id = %execution_id,
                    "Execution lock acquired"
                );
                (true, None)
            }
            Gate::Blocked(blocker) => (false, blocker),
        }
    }

    /// Takes the graph for `execution_id` or fails with
    /// [`EngineError::ConcurrentExecution`] naming the blocker.
    pub async fn validate_execution_start(
        &self,
        graph_id: Uuid,
        execution_id: Uuid,
    ) -> EngineResult<()> {
        let (acquired, blocker) = self.try_acquire(graph_id, execution_id).await;
        if acquired {
            return Ok(());
        }

        let (blocking_execution_id, started_at) = match blocker {
            Some(blocker) => (blocker.execution_id, blocker.started_at),
            None => (Uuid::nil(), None),
        };
        Err(EngineError::ConcurrentExecution {
            graph_id,
            blocking_execution_id,
            started_at,
        })
    }

    /// Releases the graph if `execution_id` holds it.
    ///
    /// Returns whether a lock was actually released. A mismatched holder is
    /// left in place and logged.
    pub async fn release(&self, graph_id: Uuid, execution_id: Uuid) -> bool {
        let mut locks = self.locks.lock().await;
        match locks.get(&graph_id) {
            Some(entry) if entry.execution_id == execution_id => {
                locks.remove(&graph_id);
                tracing::debug!(
                    target: TRACING_TARGET,
                    graph_id = %graph_id,
                    execution_id = %execution_id,
                    "Execution lock released"
                );
                true
            }
            Some(entry) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    graph_id = %graph_id,
                    execution_id = %execution_id,
                    holder = %entry.execution_id,
                    "Refusing to release lock held by another execution"
                );
                false
            }
            None => false,
        }
    }

    /// Returns the current lock entry for a graph, if any.
    pub async fn holder(&self, graph_id: Uuid) -> Option<LockEntry> {
        self.locks.lock().await.get(&graph_id).copied()
    }

    /// Number of graphs currently locked in this process.
    pub async fn locked_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Sweeps executions that have been active past the orphan timeout.
    ///
    /// Each orphan is forced to timed out through the lifecycle and its lock
    /// entry dropped. Returns the ids that were swept; per-record failures
    /// are logged and skipped.
    pub async fn cleanup_orphaned_locks(&self, lifecycle: &Lifecycle) -> EngineResult<Vec<Uuid>> {
        let cutoff = Timestamp::now() - self.orphan_timeout;
        let orphans = self.store.list_active_before(cutoff).await?;
        let mut swept = Vec::new();

        for record in orphans {
            match lifecycle.timeout_execution(record.id).await {
                Ok(_) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        execution_id = %record.id,
                        graph_id = %record.graph_id,
                        anchor = %record.activity_anchor(),
                        "Orphaned execution forced to timed out"
                    );
                    swept.push(record.id);
                }
                Err(error) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        execution_id = %record.id,
                        error = %error,
                        "Failed to sweep orphaned execution"
                    );
                    continue;
                }
            }

            let mut locks = self.locks.lock().await;
            if let Some(entry) = locks.get(&record.graph_id) {
                if entry.execution_id == record.id {
                    locks.remove(&record.graph_id);
                }
            }
        }

        Ok(swept)
    }

    /// Resolves the admission gate for a graph with the table lock held.
    ///
    /// `requesting` is the execution asking for admission; its own record
    /// never counts as a blocker.
    async fn check(
        &self,
        locks: &mut HashMap<Uuid, LockEntry>,
        graph_id: Uuid,
        requesting: Option<Uuid>,
    ) -> Gate {
        // Reconcile a local entry against the store before trusting it.
        if let Some(entry) = locks.get(&graph_id).copied() {
            if Some(entry.execution_id) == requesting {
                // Re-acquire by the current holder.
                return Gate::Clear;
            }
            match self.store.find_execution(entry.execution_id).await {
                Ok(Some(record)) if record.is_active() => {
                    return Gate::Blocked(Some(Blocker {
                        execution_id: record.id,
                        started_at: record.started_at,
                    }));
                }
                Ok(Some(_)) => {
                    // The holder finished without releasing.
                    tracing::debug!(
                        target: TRACING_TARGET,
                        graph_id = %graph_id,
                        execution_id = %entry.execution_id,
                        "Dropping stale execution lock"
                    );
                    locks.remove(&graph_id);
                }
                Ok(None) => {
                    // The holder's record is not persisted yet; trust the
                    // entry until it ages out.
                    let held = Timestamp::now().duration_since(entry.acquired_at);
                    if held > self.orphan_timeout {
                        locks.remove(&graph_id);
                    } else {
                        return Gate::Blocked(Some(Blocker {
                            execution_id: entry.execution_id,
                            started_at: None,
                        }));
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        graph_id = %graph_id,
                        error = %error,
                        "Store check failed, denying execution start"
                    );
                    return Gate::Blocked(None);
                }
            }
        }

        // No local lock; another process may still be running the graph.
        match self.store.latest_active_for_graph(graph_id, requesting).await {
            Ok(Some(record)) => {
                let idle = Timestamp::now().duration_since(record.activity_anchor());
                if idle > self.orphan_timeout {
                    // Left for the orphan sweep; do not block new runs on it.
                    tracing::warn!(
                        target: TRACING_TARGET,
                        graph_id = %graph_id,
                        execution_id = %record.id,
                        "Ignoring orphaned active execution"
                    );
                    Gate::Clear
                } else {
                    Gate::Blocked(Some(Blocker {
                        execution_id: record.id,
                        started_at: record.started_at,
                    }))
                }
            }
            Ok(None) => Gate::Clear,
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    graph_id = %graph_id,
                    error = %error,
                    "Store check failed, denying execution start"
                );
                Gate::Blocked(None)
            }
        }
    }
}

impl std::fmt::Debug for ExecutionMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionMutex")
            .field("orphan_timeout", &self.orphan_timeout)
            .finish_non_exhaustive()
    }
}
