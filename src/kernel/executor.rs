use crate::core::{Allocation, ConcreteValue, Domain, Scalar};
use crate::error::KernelError;

use super::signature::{KernelId, KernelSignature};

/// Trait for kernel execution. Each compute routine implements this.
///
/// Implementations must be deterministic for identical launches and must not
/// mutate the allocations they receive; results are returned as new values.
pub trait Kernel: Send + Sync {
    /// Declared interface, captured once when the kernel is registered.
    fn signature(&self) -> KernelSignature;

    /// Run the kernel to completion.
    fn invoke(&self, launch: &LaunchArgs<'_>) -> Result<KernelOutput, KernelError>;
}

/// Fully resolved inputs of one closure invocation.
#[derive(Debug)]
pub struct LaunchArgs<'a> {
    pub kernel: KernelId,
    pub signature: &'a KernelSignature,
    /// Launch domain. `None` for invoke closures.
    pub domain: Option<Domain>,
    pub args: &'a [ConcreteValue],
    /// Global field values by field index; `None` when the closure left the
    /// field unbound.
    pub fields: &'a [Option<ConcreteValue>],
}

impl<'a> LaunchArgs<'a> {
    pub fn domain(&self) -> Result<Domain, KernelError> {
        self.domain.ok_or_else(|| {
            KernelError::invalid_argument(format!(
                "kernel '{}' was launched without a domain",
                self.signature.name
            ))
        })
    }

    pub fn arg(&self, index: usize) -> Result<&'a ConcreteValue, KernelError> {
        self.args.get(index).ok_or_else(|| {
            KernelError::invalid_argument(format!(
                "kernel '{}' has no positional argument {}",
                self.signature.name, index
            ))
        })
    }

    pub fn arg_allocation(&self, index: usize) -> Result<&'a Allocation, KernelError> {
        self.arg(index)?.as_allocation().ok_or_else(|| {
            KernelError::type_error(format!("argument {index} is not an allocation"))
        })
    }

    /// Value of a global field, if bound.
    pub fn field(&self, name: &str) -> Option<&'a ConcreteValue> {
        let index = self.signature.field_index(name)?;
        self.fields.get(index).and_then(|v| v.as_ref())
    }

    pub fn field_allocation(&self, name: &str) -> Result<&'a Allocation, KernelError> {
        match self.field(name) {
            Some(ConcreteValue::Allocation(a)) => Ok(a),
            Some(ConcreteValue::Scalar(_)) => Err(KernelError::type_error(format!(
                "field '{name}' is not an allocation"
            ))),
            None => Err(KernelError::MissingField(name.to_string())),
        }
    }

    pub fn field_scalar(&self, name: &str) -> Result<Scalar, KernelError> {
        match self.field(name) {
            Some(ConcreteValue::Scalar(s)) => Ok(*s),
            Some(ConcreteValue::Allocation(_)) => Err(KernelError::type_error(format!(
                "field '{name}' is not a scalar"
            ))),
            None => Err(KernelError::MissingField(name.to_string())),
        }
    }
}

/// Result of one kernel invocation.
#[derive(Debug, Clone, Default)]
pub struct KernelOutput {
    /// Allocation returned by a for-each kernel.
    pub ret: Option<Allocation>,
    /// Global fields written by the kernel, by field name.
    pub globals: Vec<(String, ConcreteValue)>,
}

impl KernelOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn returning(allocation: Allocation) -> Self {
        Self {
            ret: Some(allocation),
            globals: Vec::new(),
        }
    }

    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<ConcreteValue>) -> Self {
        self.globals.push((name.into(), value.into()));
        self
    }
}
