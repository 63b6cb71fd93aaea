//! Core data model: element types, allocations, values, configuration and
//! the execution context.

pub mod allocation;
pub mod config;
pub mod context;
pub mod event_bus;
pub mod types;
pub mod value;

pub use allocation::{Allocation, AllocationId, Buffer};
pub use config::EngineConfig;
pub use context::Context;
pub use event_bus::{EventEmitter, EventRecorder, ExecutionObserver, GraphEvent};
pub use types::{DataKind, Domain, ElementType, ParamType, ScalarKind, Type, ValueType};
pub use value::{
    BuilderId, ConcreteValue, Future, FutureTarget, Scalar, UnboundValue, Value,
};
