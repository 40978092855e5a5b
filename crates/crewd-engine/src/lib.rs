#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
pub mod fault;
mod lifecycle;
mod mutex;
mod notify;
mod record;
mod service;
mod status;
pub mod store;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{EngineError, EngineResult};
pub use fault::{
    BreakerState, CircuitBreaker, FaultEngine, InvokerError, RetryDecision, RetryPolicy,
};
pub use lifecycle::{BulkOutcome, Lifecycle, StatusCallback, StatusChange};
pub use mutex::{ExecutionMutex, LockEntry};
pub use notify::{LifecycleEvent, NotificationSink, TracingSink};
pub use record::{ExecutionRecord, NewExecution, UpdateExecution};
pub use service::{ExecutionService, SweepReport};
pub use status::ExecutionStatus;
pub use store::{ExecutionStore, MemoryStore, StoreError, StoreResult};

/// Tracing target for engine operations.
pub const TRACING_TARGET: &str = "crewd_engine";
