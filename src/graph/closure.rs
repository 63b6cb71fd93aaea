use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{BuilderId, Domain, Future, FutureTarget, Value, ValueType};
use crate::error::GraphError;
use crate::kernel::{FieldId, KernelDescriptor, KernelId, KernelKind};

/// Dense per-builder closure id; also the closure's position in insertion
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClosureId(usize);

impl ClosureId {
    pub const fn new(index: usize) -> Self {
        ClosureId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ClosureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value bound to one global field of the closure's kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub field: FieldId,
    pub value: Value,
}

struct ClosureInner {
    id: ClosureId,
    builder: BuilderId,
    kernel: Arc<KernelDescriptor>,
    /// 启动域，invoke 闭包为 None
    domain: Option<Domain>,
    args: Vec<Value>,
    /// 按字段索引排序
    bindings: Vec<Binding>,
    return_type: Option<ValueType>,
}

/// One kernel invocation inside a graph.
///
/// Closures are created by [`GraphBuilder::add_kernel`](super::GraphBuilder::add_kernel)
/// and [`GraphBuilder::add_invoke`](super::GraphBuilder::add_invoke) and never
/// change afterwards; cloning shares the same invocation.
#[derive(Clone)]
pub struct Closure {
    inner: Arc<ClosureInner>,
}

impl Closure {
    pub(crate) fn new(
        id: ClosureId,
        builder: BuilderId,
        kernel: Arc<KernelDescriptor>,
        domain: Option<Domain>,
        args: Vec<Value>,
        mut bindings: Vec<Binding>,
    ) -> Self {
        bindings.sort_by_key(|b| b.field.index());
        let return_type = match (kernel.signature().kind, domain) {
            (KernelKind::ForEach { output }, Some(domain)) => Some(ValueType::Allocation {
                element: output,
                domain: Some(domain),
            }),
            _ => None,
        };
        Self {
            inner: Arc::new(ClosureInner {
                id,
                builder,
                kernel,
                domain,
                args,
                bindings,
                return_type,
            }),
        }
    }

    pub fn id(&self) -> ClosureId {
        self.inner.id
    }

    pub fn builder(&self) -> BuilderId {
        self.inner.builder
    }

    pub fn kernel(&self) -> &Arc<KernelDescriptor> {
        &self.inner.kernel
    }

    pub fn kernel_id(&self) -> KernelId {
        self.inner.kernel.id()
    }

    pub fn kernel_name(&self) -> &str {
        self.inner.kernel.name()
    }

    pub fn domain(&self) -> Option<Domain> {
        self.inner.domain
    }

    pub fn args(&self) -> &[Value] {
        &self.inner.args
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.inner.bindings
    }

    pub fn binding(&self, field: FieldId) -> Option<&Value> {
        self.inner
            .bindings
            .iter()
            .find(|b| b.field == field)
            .map(|b| &b.value)
    }

    pub fn is_invoke(&self) -> bool {
        self.inner.domain.is_none()
    }

    /// Static type of the returned allocation; `None` for invoke closures.
    pub fn return_type(&self) -> Option<ValueType> {
        self.inner.return_type
    }

    /// Future of the allocation this closure returns.
    ///
    /// Invoke closures have no return value; using their return future as an
    /// argument or graph output fails with [`GraphError::NoReturnValue`].
    pub fn get_return(&self) -> Future {
        Future {
            builder: self.inner.builder,
            closure: self.inner.id,
            target: FutureTarget::Return,
        }
    }

    /// Future of the value of global `name` after this closure ran.
    pub fn get_global(&self, name: &str) -> Result<Future, GraphError> {
        let field = self.inner.kernel.field(name)?;
        Ok(self.global_future(field))
    }

    /// Like [`get_global`](Self::get_global) for an already resolved field.
    pub fn get_global_field(&self, field: FieldId) -> Result<Future, GraphError> {
        if self.inner.kernel.field_param(field).is_none() {
            return Err(GraphError::UnknownField {
                kernel: self.kernel_name().to_string(),
                field: field.to_string(),
            });
        }
        Ok(self.global_future(field))
    }

    fn global_future(&self, field: FieldId) -> Future {
        Future {
            builder: self.inner.builder,
            closure: self.inner.id,
            target: FutureTarget::Global(field),
        }
    }

    /// Static type of the value `target` refers to.
    pub(crate) fn target_type(&self, target: FutureTarget) -> Result<ValueType, GraphError> {
        match target {
            FutureTarget::Return => self
                .inner
                .return_type
                .ok_or(GraphError::NoReturnValue(self.inner.id)),
            FutureTarget::Global(field) => {
                let param = self.inner.kernel.field_param(field).ok_or_else(|| {
                    GraphError::UnknownReference(format!(
                        "{} is not a global of kernel '{}'",
                        field,
                        self.kernel_name()
                    ))
                })?;
                Ok(param.ty.as_value_type())
            }
        }
    }

    /// Every value this closure consumes: positional arguments, then field
    /// bindings.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.inner
            .args
            .iter()
            .chain(self.inner.bindings.iter().map(|b| &b.value))
    }

    /// Closures whose futures this closure consumes, sorted and deduplicated.
    pub fn dependencies(&self) -> Vec<ClosureId> {
        let mut deps: Vec<ClosureId> = self
            .values()
            .filter_map(Value::as_future)
            .map(|f| f.closure)
            .collect();
        deps.sort();
        deps.dedup();
        deps
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("id", &self.inner.id)
            .field("kernel", &self.inner.kernel.name())
            .field("domain", &self.inner.domain)
            .field("args", &self.inner.args.len())
            .field("bindings", &self.inner.bindings.len())
            .finish()
    }
}
