//! Validator configuration.

use std::time::Duration;

use derive_builder::Builder;

/// Configuration for the structural validator.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ValidationConfig {
    /// Hard limit on node count.
    #[builder(default = "500")]
    pub max_nodes: usize,

    /// Hard limit on edge count.
    #[builder(default = "2000")]
    pub max_edges: usize,

    /// Depth beyond which a warning is emitted.
    #[builder(default = "50")]
    pub max_depth: usize,

    /// Whether a missing entry point is an error.
    #[builder(default = "true")]
    pub require_entry_point: bool,

    /// Whether a missing exit point is an error.
    #[builder(default = "true")]
    pub require_exit_point: bool,

    /// Whether circular dependencies are allowed.
    #[builder(default = "false")]
    pub allow_cycles: bool,

    /// Time-to-live of cached validation results.
    #[builder(default = "Duration::from_secs(300)")]
    pub cache_ttl: Duration,
}

impl ValidationConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_nodes {
            if max == 0 {
                return Err("max_nodes must be at least 1".into());
            }
        }
        Ok(())
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_nodes: 500,
            max_edges: 2000,
            max_depth: 50,
            require_entry_point: true,
            require_exit_point: true,
            allow_cycles: false,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config.max_nodes, 500);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(!config.allow_cycles);
    }

    #[test]
    fn test_builder_validation() {
        let config = ValidationConfigBuilder::default()
            .allow_cycles(true)
            .build()
            .unwrap();
        assert!(config.allow_cycles);

        let invalid = ValidationConfigBuilder::default().max_nodes(0usize).build();
        assert!(invalid.is_err());
    }
}
