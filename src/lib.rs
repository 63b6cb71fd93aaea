//! # kernelflow: closure/kernel dataflow graphs
//!
//! `kernelflow` builds directed acyclic graphs of compute-kernel invocations
//! ("closures") and executes them as a unit. A closure consumes values that
//! are either:
//!
//! - **bound** when the graph is built (allocations or scalars),
//! - **unbound** graph inputs, supplied on every execution, or
//! - **futures** of closures added earlier, read from their return
//!   allocation or from a global field after they ran.
//!
//! Graphs are validated while they are built, frozen by
//! [`GraphBuilder::create`], and can then be executed any number of times
//! with different inputs.
//!
//! # Quick Start
//!
//! ```rust
//! use kernelflow::{Allocation, Context, Domain, ElementType, Type};
//!
//! # fn main() -> Result<(), kernelflow::GraphError> {
//! let ctx = Context::new();
//! let kernels = ctx.register_builtins();
//!
//! let mut builder = ctx.builder().with_name("double-twice");
//! let input = builder.add_input();
//! let first = builder.add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])?;
//! let second = builder.add_kernel(
//!     kernels.double,
//!     Domain::x(4),
//!     vec![first.get_return().into()],
//!     vec![],
//! )?;
//! let graph = builder.create([second.get_return()])?;
//!
//! let data = Allocation::from_i32(Type::x(ElementType::i32(), 4), vec![1, 2, 3, 4])?;
//! let outputs = graph.execute(&[data.into()])?;
//! assert_eq!(outputs[0].as_allocation().unwrap().as_i32(), Some(&[4, 8, 12, 16][..]));
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `builtin-kernels` | CPU reference kernels (`increment`, `double`, `scale`, `strided_add`, `sum`) |

pub mod core;
pub mod error;
pub mod graph;
pub mod kernel;

pub use crate::core::{
    Allocation, AllocationId, Buffer, BuilderId, ConcreteValue, Context, DataKind, Domain,
    ElementType, EngineConfig, EventEmitter, EventRecorder, ExecutionObserver, Future,
    FutureTarget, GraphEvent, ParamType, Scalar, ScalarKind, Type, UnboundValue, Value, ValueType,
};
pub use crate::error::{
    ErrorCode, ErrorContext, ErrorRetryability, ErrorSeverity, GraphError, GraphResult,
    KernelError, KernelResult,
};
pub use crate::graph::{
    Batch, Closure, ClosureId, ClosureTiming, ExecutionReport, Graph, GraphBuilder,
    GraphDescription,
};
#[cfg(feature = "builtin-kernels")]
pub use crate::kernel::BuiltinKernels;
pub use crate::kernel::{
    FieldId, Kernel, KernelDescriptor, KernelId, KernelKind, KernelOutput, KernelRegistry,
    KernelSignature, LaunchArgs, Param,
};
