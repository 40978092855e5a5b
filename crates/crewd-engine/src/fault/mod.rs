//! Fault classification, retry, and circuit breaking.

mod breaker;
mod classify;
mod engine;
mod retry;

pub use breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
pub use classify::{InvokerError, classify};
pub use engine::{CategoryCallback, FaultEngine, RetryDecision};
pub use retry::RetryPolicy;
