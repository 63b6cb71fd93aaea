//! Graph-level error types.

use thiserror::Error;

use super::error_context::{ErrorCode, ErrorContext, ErrorSeverity};
use super::KernelError;
use crate::graph::ClosureId;
use crate::kernel::KernelId;

/// Errors raised while building or executing a kernel graph.
///
/// [`GraphError::is_build_error`] tells the variants that reject a graph
/// description apart from those raised by one execution, which leave the
/// graph usable.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Unknown reference: {0}")]
    UnknownReference(String),
    #[error("Dangling output: {0}")]
    DanglingOutput(String),
    #[error("Input arity mismatch: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("Kernel execution error: closure={closure}, kernel={kernel}, error={source}")]
    KernelExecution {
        closure: ClosureId,
        kernel: String,
        #[source]
        source: KernelError,
    },
    #[error("Type or shape mismatch: {0}")]
    TypeOrShapeMismatch(String),
    /// A concrete value seen during `execute` does not fit its declared
    /// input or kernel parameter.
    #[error("Type or shape mismatch at execution: {0}")]
    InputMismatch(String),
    #[error("Kernel not found: {0}")]
    KernelNotFound(KernelId),
    #[error("Unknown field '{field}' for kernel '{kernel}'")]
    UnknownField { kernel: String, field: String },
    #[error("Field '{field}' of kernel '{kernel}' is bound more than once")]
    DuplicateBinding { kernel: String, field: String },
    #[error("Kernel '{kernel}' takes {expected} positional arguments, got {got}")]
    KernelArityMismatch {
        kernel: String,
        expected: usize,
        got: usize,
    },
    #[error("Closure {0} has no return value")]
    NoReturnValue(ClosureId),
    #[error("Too many closures: limit is {0}")]
    TooManyClosures(usize),
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GraphError {
    /// True for errors that describe an invalid graph description rather
    /// than a failed execution.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            GraphError::UnknownReference(_)
                | GraphError::DanglingOutput(_)
                | GraphError::TypeOrShapeMismatch(_)
                | GraphError::KernelNotFound(_)
                | GraphError::UnknownField { .. }
                | GraphError::DuplicateBinding { .. }
                | GraphError::KernelArityMismatch { .. }
                | GraphError::NoReturnValue(_)
                | GraphError::TooManyClosures(_)
        )
    }

    /// Re-tag a type error found while executing rather than building.
    pub(crate) fn at_execution(self) -> Self {
        match self {
            GraphError::TypeOrShapeMismatch(message) => GraphError::InputMismatch(message),
            other => other,
        }
    }

    /// Structured metadata for this error.
    pub fn error_context(&self) -> ErrorContext {
        let message = self.to_string();
        match self {
            GraphError::UnknownReference(_) => {
                ErrorContext::fatal(ErrorCode::UnknownReference, message)
            }
            GraphError::DanglingOutput(_) => {
                ErrorContext::fatal(ErrorCode::DanglingOutput, message)
            }
            GraphError::ArityMismatch { .. } => {
                ErrorContext::non_retryable(ErrorCode::ArityMismatch, message)
            }
            GraphError::KernelExecution { .. } => {
                ErrorContext::retryable(ErrorCode::KernelExecution, message)
            }
            GraphError::TypeOrShapeMismatch(_) => {
                ErrorContext::fatal(ErrorCode::TypeOrShapeMismatch, message)
            }
            GraphError::InputMismatch(_) => {
                ErrorContext::non_retryable(ErrorCode::TypeOrShapeMismatch, message)
            }
            GraphError::KernelNotFound(_) => {
                ErrorContext::fatal(ErrorCode::KernelNotFound, message)
            }
            GraphError::UnknownField { .. } | GraphError::DuplicateBinding { .. } => {
                ErrorContext::fatal(ErrorCode::InvalidBinding, message)
            }
            GraphError::KernelArityMismatch { .. } => {
                ErrorContext::fatal(ErrorCode::KernelArityMismatch, message)
            }
            GraphError::NoReturnValue(_) => {
                ErrorContext::fatal(ErrorCode::DanglingOutput, message)
            }
            GraphError::TooManyClosures(_) => {
                ErrorContext::fatal(ErrorCode::ResourceLimit, message)
            }
            GraphError::InvalidAllocation(_) => {
                ErrorContext::non_retryable(ErrorCode::InvalidAllocation, message)
            }
            GraphError::Config(_) => ErrorContext::fatal(ErrorCode::ConfigError, message),
            GraphError::Internal(_) => ErrorContext {
                severity: ErrorSeverity::Fatal,
                ..ErrorContext::non_retryable(ErrorCode::InternalError, message)
            },
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Config(e.to_string())
    }
}
