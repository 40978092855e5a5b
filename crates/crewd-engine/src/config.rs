//! Engine configuration.

use std::time::Duration;

use derive_builder::Builder;
use jiff::SignedDuration;

/// Configuration for the execution engine.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Active executions idle past this are treated as orphaned.
    #[builder(default = "SignedDuration::from_mins(60)")]
    pub orphan_timeout: SignedDuration,

    /// Interval between background sweep runs.
    #[builder(default = "Duration::from_secs(300)")]
    pub sweep_interval: Duration,

    /// Consecutive failures before a circuit breaker opens.
    #[builder(default = "5")]
    pub breaker_failure_threshold: u32,

    /// Cooldown before an open circuit breaker allows a probe call.
    #[builder(default = "Duration::from_secs(60)")]
    pub breaker_recovery_timeout: Duration,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(timeout) = self.orphan_timeout {
            if timeout <= SignedDuration::ZERO {
                return Err("orphan_timeout must be positive".into());
            }
        }
        if let Some(threshold) = self.breaker_failure_threshold {
            if threshold == 0 {
                return Err("breaker_failure_threshold must be at least 1".into());
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            orphan_timeout: SignedDuration::from_mins(60),
            sweep_interval: Duration::from_secs(300),
            breaker_failure_threshold: 5,
            breaker_recovery_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.orphan_timeout, SignedDuration::from_mins(60));
        assert_eq!(config.breaker_failure_threshold, 5);
    }

    #[test]
    fn test_builder_validation() {
        let config = EngineConfigBuilder::default()
            .sweep_interval(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(config.sweep_interval, Duration::from_secs(30));

        let invalid = EngineConfigBuilder::default()
            .breaker_failure_threshold(0u32)
            .build();
        assert!(invalid.is_err());
    }
}
