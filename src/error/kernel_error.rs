use thiserror::Error;

/// Kernel-level errors, raised by a [`Kernel`](crate::kernel::Kernel) implementation
/// while it runs over its launch domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Execution error: {0}")]
    ExecutionError(String),
}

impl KernelError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        KernelError::InvalidArgument(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        KernelError::TypeError(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        KernelError::ExecutionError(message.into())
    }
}
