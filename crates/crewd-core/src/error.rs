//! Classified execution error definitions.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// This type is commonly used as a source error in structured error types,
/// providing a way to wrap any error that implements the standard `Error` trait
/// while maintaining Send and Sync bounds for multi-threaded contexts.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Categories of faults recognized by the fault engine.
///
/// Every classified error falls into exactly one category; the category
/// selects the retry policy that governs recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, IntoStaticStr, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection or network-level fault.
    Network,
    /// Input failed validation.
    Validation,
    /// Resource exhaustion (memory, disk, quota).
    Resource,
    /// A downstream collaborator failed.
    ExternalService,
    /// Unclassified internal fault.
    Internal,
    /// An operation exceeded its deadline.
    Timeout,
    /// Invalid or missing configuration.
    Configuration,
    /// Authorization was denied.
    Permission,
}

impl ErrorCategory {
    /// Returns whether faults in this category are retried by default.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::ExternalService
                | ErrorCategory::Resource
                | ErrorCategory::Timeout
                | ErrorCategory::Internal
        )
    }
}

/// Severity of a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, AsRefStr, IntoStaticStr, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Informational; no action required.
    Low,
    /// Degraded but recoverable.
    Medium,
    /// Operation failed; recovery may be possible.
    High,
    /// Operation failed and requires attention.
    Critical,
}

/// A classified execution error.
///
/// Carries a stable code, severity, and explicit recovery flags so calling
/// layers can branch on values rather than on error type hierarchies.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct ExecutionError {
    /// Fault category driving the retry policy.
    pub category: ErrorCategory,
    /// Severity of the fault.
    pub severity: ErrorSeverity,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Whether the overall operation can recover from this fault.
    pub recoverable: bool,
    /// Whether a retry is recommended for this fault.
    pub retry_recommended: bool,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
}

impl ExecutionError {
    /// Creates a new error with category defaults for severity and flags.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        let (severity, code) = match category {
            ErrorCategory::Network => (ErrorSeverity::Medium, "network_error"),
            ErrorCategory::Validation => (ErrorSeverity::High, "validation_error"),
            ErrorCategory::Resource => (ErrorSeverity::High, "resource_exhausted"),
            ErrorCategory::ExternalService => (ErrorSeverity::Medium, "external_service_error"),
            ErrorCategory::Internal => (ErrorSeverity::Critical, "internal_error"),
            ErrorCategory::Timeout => (ErrorSeverity::Medium, "timeout"),
            ErrorCategory::Configuration => (ErrorSeverity::High, "configuration_error"),
            ErrorCategory::Permission => (ErrorSeverity::High, "permission_denied"),
        };
        let retryable = category.is_retryable();

        Self {
            category,
            severity,
            code: code.to_owned(),
            message: message.into(),
            recoverable: retryable,
            retry_recommended: retryable && category != ErrorCategory::Internal,
            source: None,
        }
    }

    /// Creates a new network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    /// Creates a new resource exhaustion error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Resource, message)
    }

    /// Creates a new external service error.
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ExternalService, message)
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, message)
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message)
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, message)
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Permission, message)
    }

    /// Creates the fast-fail error surfaced when a circuit breaker is open.
    pub fn external_service_unavailable(name: impl AsRef<str>) -> Self {
        let mut error = Self::new(
            ErrorCategory::ExternalService,
            format!("dependency '{}' is unavailable", name.as_ref()),
        );
        error.code = "external_service_unavailable".to_owned();
        error.retry_recommended = false;
        error
    }

    /// Overrides the stable error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Overrides the severity.
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds a source error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns whether a retry is recommended for this error.
    pub fn is_retryable(&self) -> bool {
        self.retry_recommended
    }

    /// Serializes the classification into a JSON detail payload.
    ///
    /// Used when persisting a failure onto an execution record.
    pub fn to_details(&self) -> serde_json::Value {
        serde_json::json!({
            "category": self.category,
            "severity": self.severity,
            "code": self.code,
            "message": self.message,
            "recoverable": self.recoverable,
            "retry_recommended": self.retry_recommended,
            "source": self.source.as_ref().map(|s| s.to_string()),
        })
    }
}
