//! Error types for the condition engine.
//!
//! All errors are strongly typed using thiserror. Configuration problems are
//! `ValidationError`s; everything that goes wrong while talking to object or
//! telemetry providers is an `ExecutionError`.
//!
//! Note that most of these never reach a caller of `Condition`: a criterion
//! that fails to compile or resolve degrades to a `false` / absent result and
//! logs the error instead.

use thiserror::Error;

/// Validation errors raised while interpreting configuration.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unknown operation '{name}'")]
    UnknownOperation {
        name: String,
    },

    #[error("Operation '{operation}' takes {expected} input(s), got {actual}")]
    InvalidArity {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Input {index} of operation '{operation}' is invalid: {reason}")]
    InvalidOperand {
        operation: String,
        index: usize,
        reason: String,
    },

    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex {
        pattern: String,
        reason: String,
    },

    #[error("Unknown trigger '{value}', expected 'all' or 'any'")]
    UnknownTrigger {
        value: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        reason: String,
    },
}

/// Execution errors raised by providers and channels.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Object not found: {id}")]
    ObjectNotFound {
        id: String,
    },

    #[error("No telemetry provider supports object {id}")]
    Unsupported {
        id: String,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Top-level error type.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the error means a referenced object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::ObjectNotFound { .. }))
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_arity() {
        let err = ValidationError::InvalidArity {
            operation: "between".to_string(),
            expected: 2,
            actual: 1,
        };
        let msg = format!("{err}");
        assert!(msg.contains("between"));
        assert!(msg.contains("2 input"));
        assert!(msg.contains("got 1"));
    }

    #[test]
    fn test_validation_error_unknown_operation() {
        let err = ValidationError::UnknownOperation {
            name: "isBlue".to_string(),
        };
        assert_eq!(format!("{err}"), "Unknown operation 'isBlue'");
    }

    #[test]
    fn test_execution_error_not_found() {
        let err = ExecutionError::ObjectNotFound {
            id: "ns:abc".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Object not found"));
        assert!(msg.contains("ns:abc"));
    }

    #[test]
    fn test_engine_error_from_validation() {
        let err: EngineError = ValidationError::MissingField {
            field: "samples".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_execution());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_engine_error_from_execution() {
        let err: EngineError = ExecutionError::ObjectNotFound {
            id: "x".to_string(),
        }
        .into();
        assert!(err.is_execution());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_engine_error_internal() {
        let err = EngineError::internal("poisoned lock");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("poisoned lock"));
    }
}
