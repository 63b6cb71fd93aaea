use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{ElementType, ParamType};

/// Strongly typed handle to a kernel registered with a [`KernelRegistry`](super::KernelRegistry).
///
/// Carries the id of the issuing registry, so a handle from one context never
/// resolves in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KernelId {
    registry: Uuid,
    index: u32,
}

impl KernelId {
    pub(crate) const fn new(registry: Uuid, index: u32) -> Self {
        KernelId { registry, index }
    }

    /// Id of the registry that issued this handle.
    pub fn registry(&self) -> Uuid {
        self.registry
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel#{}", self.index)
    }
}

/// A global field of one kernel, resolved from its name at graph-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId {
    kernel: KernelId,
    index: u32,
}

impl FieldId {
    pub(crate) fn new(kernel: KernelId, index: u32) -> Self {
        FieldId { kernel, index }
    }

    pub fn kernel(&self) -> KernelId {
        self.kernel
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.global{}", self.kernel, self.index)
    }
}

/// How a kernel is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// Data-parallel launch over an output domain, returning one allocation.
    /// `output` is the returned element type when it is fixed by the kernel.
    ForEach { output: Option<ElementType> },
    /// Single call of an invokable function; results are published through
    /// global fields.
    Invoke,
}

/// One named, typed kernel parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
}

/// Declared interface of a kernel: launch kind, positional arguments and
/// global fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSignature {
    pub name: String,
    pub kind: KernelKind,
    pub args: Vec<Param>,
    pub fields: Vec<Param>,
}

impl KernelSignature {
    pub fn for_each(name: impl Into<String>, output: Option<ElementType>) -> Self {
        Self {
            name: name.into(),
            kind: KernelKind::ForEach { output },
            args: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn invoke(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: KernelKind::Invoke,
            args: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.args.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.fields.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self.kind, KernelKind::Invoke)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}
