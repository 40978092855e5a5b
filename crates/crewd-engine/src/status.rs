//! Execution status enumeration and transition table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Defines the lifecycle status of a workflow execution.
///
/// Transitions are restricted to the table encoded in
/// [`ExecutionStatus::can_transition_to`]; every mutation of an execution
/// record goes through the lifecycle service, which enforces it.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumIter, EnumString)]
pub enum ExecutionStatus {
    /// Run is created and waiting to start.
    #[serde(rename = "pending")]
    #[strum(serialize = "pending")]
    #[default]
    Pending,

    /// Run is in progress.
    #[serde(rename = "running")]
    #[strum(serialize = "running")]
    Running,

    /// Run finished successfully.
    #[serde(rename = "completed")]
    #[strum(serialize = "completed")]
    Completed,

    /// Run failed with an error.
    #[serde(rename = "failed")]
    #[strum(serialize = "failed")]
    Failed,

    /// Run was cancelled.
    #[serde(rename = "cancelled")]
    #[strum(serialize = "cancelled")]
    Cancelled,

    /// Run exceeded its time budget.
    #[serde(rename = "timeout")]
    #[strum(serialize = "timeout")]
    TimedOut,
}

impl ExecutionStatus {
    /// Returns whether the run is waiting to start.
    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, ExecutionStatus::Pending)
    }

    /// Returns whether the run is currently running.
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, ExecutionStatus::Running)
    }

    /// Returns whether the run completed successfully.
    #[inline]
    pub fn is_completed(self) -> bool {
        matches!(self, ExecutionStatus::Completed)
    }

    /// Returns whether the run is still active (pending or running).
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }

    /// Returns whether the run has finished, successfully or not.
    ///
    /// Finished runs carry a completion timestamp and duration.
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::TimedOut
        )
    }

    /// Returns whether no further transition is possible from this status.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Cancelled)
    }

    /// Returns whether the run can be retried (transitioned back to pending).
    #[inline]
    pub fn is_retriable(self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::TimedOut)
    }

    /// Returns whether a transition to `next` is allowed.
    ///
    /// `Failed` and `TimedOut` return to `Pending` on retry; `Completed` and
    /// `Cancelled` are terminal. `Pending` may be forced to `TimedOut` by the
    /// orphan sweep when a run never started within its time budget.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Pending, TimedOut)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, TimedOut)
                | (Failed, Pending)
                | (TimedOut, Pending)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_terminal_states_accept_nothing() {
        for next in ExecutionStatus::iter() {
            assert!(!ExecutionStatus::Completed.can_transition_to(next));
            assert!(!ExecutionStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_retry_transitions() {
        assert!(ExecutionStatus::Failed.can_transition_to(ExecutionStatus::Pending));
        assert!(ExecutionStatus::TimedOut.can_transition_to(ExecutionStatus::Pending));
        assert!(!ExecutionStatus::Failed.can_transition_to(ExecutionStatus::Running));
    }

    #[test]
    fn test_running_transitions() {
        assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::Completed));
        assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::TimedOut));
        assert!(!ExecutionStatus::Running.can_transition_to(ExecutionStatus::Pending));
    }

    #[test]
    fn test_timeout_wire_form() {
        let json = serde_json::to_string(&ExecutionStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timeout\"");
        assert_eq!(ExecutionStatus::TimedOut.to_string(), "timeout");
    }

    #[test]
    fn test_predicates() {
        assert!(ExecutionStatus::Pending.is_active());
        assert!(ExecutionStatus::Running.is_active());
        assert!(ExecutionStatus::Failed.is_finished());
        assert!(!ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Failed.is_retriable());
    }
}
