//! Values flowing along graph edges.
//!
//! A [`Value`] is either data known when the graph is built ([`Value::Bound`]),
//! a graph input filled at every execution ([`Value::Unbound`]), or the
//! deferred result of an earlier closure ([`Value::Future`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::allocation::Allocation;
use super::types::{ScalarKind, ValueType};
use crate::graph::ClosureId;
use crate::kernel::FieldId;

/// Primitive value bound to a kernel global.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    I32(i32),
    I64(i64),
    U32(u32),
    F32(f32),
    F64(f64),
    Bool(bool),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::I32(_) => ScalarKind::I32,
            Scalar::I64(_) => ScalarKind::I64,
            Scalar::U32(_) => ScalarKind::U32,
            Scalar::F32(_) => ScalarKind::F32,
            Scalar::F64(_) => ScalarKind::F64,
            Scalar::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Integer view of the scalar; floats and booleans yield `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::I32(v) => Some(v as i64),
            Scalar::I64(v) => Some(v),
            Scalar::U32(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::I32(v) => Some(v as f64),
            Scalar::I64(v) => Some(v as f64),
            Scalar::U32(v) => Some(v as f64),
            Scalar::F32(v) => Some(v as f64),
            Scalar::F64(v) => Some(v),
            Scalar::Bool(_) => None,
        }
    }
}

/// Concrete data: what kernels consume and produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcreteValue {
    Allocation(Allocation),
    Scalar(Scalar),
}

impl ConcreteValue {
    pub fn as_allocation(&self) -> Option<&Allocation> {
        match self {
            ConcreteValue::Allocation(a) => Some(a),
            ConcreteValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            ConcreteValue::Scalar(s) => Some(*s),
            ConcreteValue::Allocation(_) => None,
        }
    }

    pub fn into_allocation(self) -> Option<Allocation> {
        match self {
            ConcreteValue::Allocation(a) => Some(a),
            ConcreteValue::Scalar(_) => None,
        }
    }

    /// Fully known type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            ConcreteValue::Allocation(a) => ValueType::allocation(a.ty()),
            ConcreteValue::Scalar(s) => ValueType::Scalar(s.kind()),
        }
    }
}

impl From<Allocation> for ConcreteValue {
    fn from(value: Allocation) -> Self {
        ConcreteValue::Allocation(value)
    }
}

impl From<Scalar> for ConcreteValue {
    fn from(value: Scalar) -> Self {
        ConcreteValue::Scalar(value)
    }
}

/// Identity of one [`GraphBuilder`](crate::graph::GraphBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuilderId(Uuid);

impl BuilderId {
    pub(crate) fn new() -> Self {
        BuilderId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Graph input placeholder. Its identity is its slot index within one builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnboundValue {
    pub(crate) builder: BuilderId,
    pub(crate) slot: usize,
    pub(crate) declared: Option<ValueType>,
}

impl UnboundValue {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn builder(&self) -> BuilderId {
        self.builder
    }

    /// Type declared with `add_typed_input`, if any.
    pub fn declared_type(&self) -> Option<ValueType> {
        self.declared
    }
}

/// What part of a closure's result a [`Future`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FutureTarget {
    /// The allocation returned by a kernel closure.
    Return,
    /// The value of a global field after the closure ran.
    Global(FieldId),
}

/// Deferred result of a closure registered with a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Future {
    pub(crate) builder: BuilderId,
    pub(crate) closure: ClosureId,
    pub(crate) target: FutureTarget,
}

impl Future {
    pub fn closure(&self) -> ClosureId {
        self.closure
    }

    pub fn target(&self) -> FutureTarget {
        self.target
    }

    pub fn builder(&self) -> BuilderId {
        self.builder
    }

    /// True when this future refers to a global rather than a return value.
    pub fn is_global(&self) -> bool {
        matches!(self.target, FutureTarget::Global(_))
    }
}

impl fmt::Display for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            FutureTarget::Return => write!(f, "future({}.return)", self.closure),
            FutureTarget::Global(field) => write!(f, "future({}.{})", self.closure, field),
        }
    }
}

/// A graph edge value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bound(ConcreteValue),
    Unbound(UnboundValue),
    Future(Future),
}

impl Value {
    pub fn as_future(&self) -> Option<&Future> {
        match self {
            Value::Future(f) => Some(f),
            _ => None,
        }
    }

    /// Short description used in error messages and graph descriptions.
    pub fn describe(&self) -> String {
        match self {
            Value::Bound(ConcreteValue::Allocation(a)) => format!("bound({})", a.id()),
            Value::Bound(ConcreteValue::Scalar(s)) => format!("bound({s:?})"),
            Value::Unbound(u) => format!("input({})", u.slot),
            Value::Future(f) => f.to_string(),
        }
    }
}

impl From<ConcreteValue> for Value {
    fn from(value: ConcreteValue) -> Self {
        Value::Bound(value)
    }
}

impl From<Allocation> for Value {
    fn from(value: Allocation) -> Self {
        Value::Bound(ConcreteValue::Allocation(value))
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Value::Bound(ConcreteValue::Scalar(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Bound(ConcreteValue::Scalar(Scalar::I32(value)))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Bound(ConcreteValue::Scalar(Scalar::F32(value)))
    }
}

impl From<UnboundValue> for Value {
    fn from(value: UnboundValue) -> Self {
        Value::Unbound(value)
    }
}

impl From<&UnboundValue> for Value {
    fn from(value: &UnboundValue) -> Self {
        Value::Unbound(*value)
    }
}

impl From<Future> for Value {
    fn from(value: Future) -> Self {
        Value::Future(value)
    }
}

impl From<&Future> for Value {
    fn from(value: &Future) -> Self {
        Value::Future(*value)
    }
}
