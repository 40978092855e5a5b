//! Invoker fault classification.

use thiserror::Error;

use crewd_core::ExecutionError;

/// Faults raised by the execution invoker.
///
/// The invoker is an opaque collaborator; the engine only ever inspects the
/// kind and message of what it raises.
#[derive(Debug, Error)]
pub enum InvokerError {
    /// A connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The invoker rejected its input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The invoker ran out of memory or another bounded resource.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// The invoker was denied authorization.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The invoker exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A downstream service the invoker depends on failed.
    #[error("external service '{service}' failed: {message}")]
    ExternalService {
        /// Name of the failing dependency.
        service: String,
        /// What went wrong.
        message: String,
    },

    /// Anything the invoker could not classify.
    #[error("{0}")]
    Other(String),
}

/// Maps an invoker fault onto a classified execution error.
///
/// Unclassified faults land in the internal category at critical severity
/// with retries not recommended.
pub fn classify(error: InvokerError) -> ExecutionError {
    match error {
        InvokerError::Connection(message) => ExecutionError::network(message),
        InvokerError::InvalidInput(message) => ExecutionError::validation(message),
        InvokerError::OutOfMemory(message) => ExecutionError::resource(message),
        InvokerError::PermissionDenied(message) => ExecutionError::permission(message),
        InvokerError::Timeout(message) => ExecutionError::timeout(message),
        InvokerError::ExternalService { service, message } => {
            ExecutionError::external_service(format!("{service}: {message}"))
        }
        InvokerError::Other(message) => ExecutionError::internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewd_core::{ErrorCategory, ErrorSeverity};

    #[test]
    fn test_connection_maps_to_network() {
        let error = classify(InvokerError::Connection("refused".into()));
        assert_eq!(error.category, ErrorCategory::Network);
        assert!(error.retry_recommended);
    }

    #[test]
    fn test_invalid_input_not_retryable() {
        let error = classify(InvokerError::InvalidInput("bad payload".into()));
        assert_eq!(error.category, ErrorCategory::Validation);
        assert!(!error.retry_recommended);
        assert!(!error.recoverable);
    }

    #[test]
    fn test_out_of_memory_maps_to_resource() {
        let error = classify(InvokerError::OutOfMemory("heap exhausted".into()));
        assert_eq!(error.category, ErrorCategory::Resource);
        assert!(error.retry_recommended);
    }

    #[test]
    fn test_permission_denied_not_retryable() {
        let error = classify(InvokerError::PermissionDenied("no access".into()));
        assert_eq!(error.category, ErrorCategory::Permission);
        assert!(!error.retry_recommended);
    }

    #[test]
    fn test_unclassified_is_critical_internal() {
        let error = classify(InvokerError::Other("surprise".into()));
        assert_eq!(error.category, ErrorCategory::Internal);
        assert_eq!(error.severity, ErrorSeverity::Critical);
        assert!(!error.retry_recommended);
    }

    #[test]
    fn test_external_service_keeps_service_name() {
        let error = classify(InvokerError::ExternalService {
            service: "inference".into(),
            message: "502".into(),
        });
        assert_eq!(error.category, ErrorCategory::ExternalService);
        assert!(error.message.starts_with("inference:"));
    }
}
