//! Per-category retry policies.

use std::time::Duration;

use rand::Rng;

use crewd_core::ErrorCategory;

const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);
const JITTER_RANGE: std::ops::RangeInclusive<f64> = 0.75..=1.25;

/// Exponential backoff policy for one fault category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub exponential_base: f64,
    /// Whether delays get ±25% uniform jitter.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy with default bound, base 2 growth, and jitter on.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
            exponential_base: 2.0,
            jitter: true,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Disables jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Overrides the delay upper bound.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// The default policy table.
    pub fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Network => Self::new(3, Duration::from_secs(2)),
            ErrorCategory::ExternalService => Self::new(5, Duration::from_secs(1)),
            ErrorCategory::Resource => Self::new(3, Duration::from_secs(5)),
            ErrorCategory::Timeout => Self::new(2, Duration::from_secs(10)),
            ErrorCategory::Internal => Self::new(1, Duration::from_secs(5)),
            ErrorCategory::Validation
            | ErrorCategory::Configuration
            | ErrorCategory::Permission => Self::no_retry(),
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// `min(max_delay, base_delay * exponential_base^attempt)`, with ±25%
    /// uniform jitter unless disabled, floored at zero.
    pub fn get_delay(&self, attempt: u32) -> Duration {
        let raw = self.base_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let mut seconds = raw.min(self.max_delay.as_secs_f64());
        if self.jitter {
            seconds *= rand::rng().random_range(JITTER_RANGE);
        }
        Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(self.max_delay)
    }
}
