use crate::core::{BuilderId, Context, Domain, Future, FutureTarget, UnboundValue, Value, ValueType};
use crate::error::GraphError;
use crate::kernel::{FieldId, KernelDescriptor, KernelId, KernelKind};

use super::closure::{Binding, Closure, ClosureId};
use super::runtime::Graph;
use super::validator::{self, Scope};

/// Incrementally declares inputs and closures, then freezes them into a
/// [`Graph`] with [`create`](Self::create).
///
/// Every value handed to the builder is validated immediately, so a closure
/// can only consume inputs declared by this builder and futures of closures
/// added before it. Insertion order is therefore a topological order.
pub struct GraphBuilder {
    id: BuilderId,
    context: Context,
    name: Option<String>,
    inputs: Vec<UnboundValue>,
    closures: Vec<Closure>,
}

impl GraphBuilder {
    /// New empty builder; usually obtained from [`Context::builder`].
    pub fn new(context: Context) -> Self {
        let id = BuilderId::new();
        tracing::debug!(builder = %id, "graph builder created");
        Self {
            id,
            context,
            name: None,
            inputs: Vec::new(),
            closures: Vec::new(),
        }
    }

    pub fn id(&self) -> BuilderId {
        self.id
    }

    /// Name used for the created graph in logs and descriptions.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Declare the next graph input.
    pub fn add_input(&mut self) -> UnboundValue {
        self.push_input(None)
    }

    /// Declare the next graph input with a type checked against its consumers
    /// now and against the concrete value at every execution.
    pub fn add_typed_input(&mut self, ty: ValueType) -> UnboundValue {
        self.push_input(Some(ty))
    }

    fn push_input(&mut self, declared: Option<ValueType>) -> UnboundValue {
        let input = UnboundValue {
            builder: self.id,
            slot: self.inputs.len(),
            declared,
        };
        tracing::debug!(builder = %self.id, slot = input.slot, ?declared, "input declared");
        self.inputs.push(input);
        input
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn closure_count(&self) -> usize {
        self.closures.len()
    }

    pub fn closures(&self) -> &[Closure] {
        &self.closures
    }

    pub fn closure(&self, id: ClosureId) -> Option<&Closure> {
        self.closures.get(id.index())
    }

    /// Return future of closure `id`, for wiring graphs from external
    /// descriptions. The id is checked when the future is used.
    pub fn future_of(&self, id: ClosureId) -> Future {
        Future {
            builder: self.id,
            closure: id,
            target: FutureTarget::Return,
        }
    }

    /// Add a data-parallel launch of `kernel` over `domain`.
    pub fn add_kernel(
        &mut self,
        kernel: KernelId,
        domain: Domain,
        args: Vec<Value>,
        bindings: Vec<(FieldId, Value)>,
    ) -> Result<Closure, GraphError> {
        let descriptor = self.context.registry().resolve(kernel)?;
        if descriptor.signature().is_invoke() {
            return Err(GraphError::TypeOrShapeMismatch(format!(
                "kernel '{}' is invokable and cannot be launched over a domain",
                descriptor.name()
            )));
        }
        if domain.is_empty() {
            return Err(GraphError::TypeOrShapeMismatch(format!(
                "launch domain {} of kernel '{}' is empty",
                domain,
                descriptor.name()
            )));
        }
        if domain.count().is_none() {
            return Err(GraphError::TypeOrShapeMismatch(format!(
                "launch domain {} of kernel '{}' has more cells than fit in memory",
                domain,
                descriptor.name()
            )));
        }
        self.push_closure(descriptor, Some(domain), args, bindings)
    }

    /// Add a single call of an invokable kernel. Its results are read back
    /// with [`Closure::get_global`].
    pub fn add_invoke(
        &mut self,
        kernel: KernelId,
        args: Vec<Value>,
        bindings: Vec<(FieldId, Value)>,
    ) -> Result<Closure, GraphError> {
        let descriptor = self.context.registry().resolve(kernel)?;
        if let KernelKind::ForEach { .. } = descriptor.signature().kind {
            return Err(GraphError::TypeOrShapeMismatch(format!(
                "kernel '{}' needs a launch domain; use add_kernel",
                descriptor.name()
            )));
        }
        self.push_closure(descriptor, None, args, bindings)
    }

    fn push_closure(
        &mut self,
        descriptor: std::sync::Arc<KernelDescriptor>,
        domain: Option<Domain>,
        args: Vec<Value>,
        bindings: Vec<(FieldId, Value)>,
    ) -> Result<Closure, GraphError> {
        let config = self.context.config();
        if config.max_closures > 0 && self.closures.len() >= config.max_closures {
            return Err(GraphError::TooManyClosures(config.max_closures));
        }

        let signature = descriptor.signature();
        if config.strict_arity && args.len() != signature.arity() {
            return Err(GraphError::KernelArityMismatch {
                kernel: signature.name.clone(),
                expected: signature.arity(),
                got: args.len(),
            });
        }
        validator::check_bindings(&descriptor, &bindings)?;

        let scope = Scope {
            builder: self.id,
            inputs: &self.inputs,
            closures: &self.closures,
        };
        for (index, arg) in args.iter().enumerate() {
            let actual = scope.value_type(arg)?;
            if config.check_types {
                if let Some(param) = signature.args.get(index) {
                    validator::check_param(&signature.name, param, &actual, domain, true)?;
                }
            }
        }
        for (field, value) in &bindings {
            let actual = scope.value_type(value)?;
            if config.check_types {
                if let Some(param) = descriptor.field_param(*field) {
                    validator::check_param(&signature.name, param, &actual, domain, false)?;
                }
            }
        }

        let id = ClosureId::new(self.closures.len());
        let closure = Closure::new(
            id,
            self.id,
            descriptor,
            domain,
            args,
            bindings
                .into_iter()
                .map(|(field, value)| Binding { field, value })
                .collect(),
        );
        tracing::debug!(
            builder = %self.id,
            closure = %id,
            kernel = closure.kernel_name(),
            domain = ?domain,
            "closure added"
        );
        self.closures.push(closure.clone());
        Ok(closure)
    }

    /// Freeze the builder into an executable graph returning `outputs`, in
    /// this order, from every execution.
    pub fn create<I, V>(self, outputs: I) -> Result<Graph, GraphError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let outputs: Vec<Value> = outputs.into_iter().map(Into::into).collect();
        let scope = Scope {
            builder: self.id,
            inputs: &self.inputs,
            closures: &self.closures,
        };
        let outputs = validator::check_outputs(&scope, &outputs)?;
        Graph::new(
            self.context,
            self.name,
            self.inputs,
            self.closures,
            outputs,
        )
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs.len())
            .field("closures", &self.closures.len())
            .finish()
    }
}
