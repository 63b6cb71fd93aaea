//! Closure graphs: building, validation, topology and execution.
//!
//! A [`GraphBuilder`] obtained from a [`Context`](crate::core::Context)
//! collects inputs and closures. [`GraphBuilder::create`] freezes them into a
//! [`Graph`] that can be executed any number of times.

pub mod builder;
pub mod closure;
pub mod runtime;
pub mod topology;
mod validator;

pub use builder::GraphBuilder;
pub use closure::{Binding, Closure, ClosureId};
pub use runtime::{
    Batch, ClosureDescription, ClosureTiming, ExecutionReport, Graph, GraphDescription,
    InputDescription,
};
pub use topology::{ClosureNode, Consumer, DependencyEdge, DependencyGraph};
