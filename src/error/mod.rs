//! Error types for the graph engine.
//!
//! - [`GraphError`]: Errors raised while building or executing a graph.
//! - [`KernelError`]: Errors raised by an individual kernel invocation.
//! - [`ErrorContext`]: Structured error metadata (code, retryability, severity).

pub mod error_context;
pub mod graph_error;
pub mod kernel_error;

pub use error_context::{ErrorCode, ErrorContext, ErrorRetryability, ErrorSeverity};
pub use graph_error::GraphError;
pub use kernel_error::KernelError;

/// Convenience alias for graph-level results.
pub type GraphResult<T> = Result<T, GraphError>;
/// Convenience alias for kernel-level results.
pub type KernelResult<T> = Result<T, KernelError>;
