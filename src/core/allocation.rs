//! Opaque, immutable, typed storage handed to kernels.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{DataKind, Type};
use crate::error::GraphError;

/// Allocation identity, shared by every clone of one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationId(Uuid);

impl AllocationId {
    fn next() -> Self {
        AllocationId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alloc-{}", self.0.simple())
    }
}

/// Backing storage, one variant per [`DataKind`]. Vector lanes are interleaved.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    U8(Vec<u8>),
}

impl Buffer {
    pub fn kind(&self) -> DataKind {
        match self {
            Buffer::I32(_) => DataKind::I32,
            Buffer::U32(_) => DataKind::U32,
            Buffer::F32(_) => DataKind::F32,
            Buffer::U8(_) => DataKind::U8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::I32(v) => v.len(),
            Buffer::U32(v) => v.len(),
            Buffer::F32(v) => v.len(),
            Buffer::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-filled buffer of `kind` with `len` lanes.
    pub fn zeroed(kind: DataKind, len: usize) -> Self {
        match kind {
            DataKind::I32 => Buffer::I32(vec![0; len]),
            DataKind::U32 => Buffer::U32(vec![0; len]),
            DataKind::F32 => Buffer::F32(vec![0.0; len]),
            DataKind::U8 => Buffer::U8(vec![0; len]),
        }
    }
}

#[derive(Debug)]
struct AllocationInner {
    id: AllocationId,
    ty: Type,
    buffer: Buffer,
}

/// Reference-counted handle to typed, shaped storage.
///
/// Allocations are immutable once created; cloning shares the storage.
/// Kernels produce new allocations instead of writing into their inputs.
#[derive(Clone)]
pub struct Allocation {
    inner: Arc<AllocationInner>,
}

impl Allocation {
    /// Wrap `buffer` as an allocation of type `ty`.
    ///
    /// The buffer kind must match the element kind and its length must be
    /// `ty.lane_count()`.
    pub fn new(ty: Type, buffer: Buffer) -> Result<Self, GraphError> {
        if !ty.element.is_valid() {
            return Err(GraphError::InvalidAllocation(format!(
                "vector size {} is outside 1..=4",
                ty.element.vector_size
            )));
        }
        if buffer.kind() != ty.element.kind {
            return Err(GraphError::InvalidAllocation(format!(
                "buffer of {:?} cannot back element type {}",
                buffer.kind(),
                ty.element
            )));
        }
        let lanes = lane_count(&ty)?;
        if buffer.len() != lanes {
            return Err(GraphError::InvalidAllocation(format!(
                "type {} needs {} lanes, buffer has {}",
                ty,
                lanes,
                buffer.len()
            )));
        }
        Ok(Self {
            inner: Arc::new(AllocationInner {
                id: AllocationId::next(),
                ty,
                buffer,
            }),
        })
    }

    /// Zero-initialised allocation of type `ty`.
    pub fn zeroed(ty: Type) -> Result<Self, GraphError> {
        let lanes = lane_count(&ty)?;
        Self::new(ty, Buffer::zeroed(ty.element.kind, lanes))
    }

    pub fn from_i32(ty: Type, data: Vec<i32>) -> Result<Self, GraphError> {
        Self::new(ty, Buffer::I32(data))
    }

    pub fn from_u32(ty: Type, data: Vec<u32>) -> Result<Self, GraphError> {
        Self::new(ty, Buffer::U32(data))
    }

    pub fn from_f32(ty: Type, data: Vec<f32>) -> Result<Self, GraphError> {
        Self::new(ty, Buffer::F32(data))
    }

    pub fn from_u8(ty: Type, data: Vec<u8>) -> Result<Self, GraphError> {
        Self::new(ty, Buffer::U8(data))
    }

    pub fn id(&self) -> AllocationId {
        self.inner.id
    }

    pub fn ty(&self) -> Type {
        self.inner.ty
    }

    pub fn buffer(&self) -> &Buffer {
        &self.inner.buffer
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.inner.buffer {
            Buffer::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.inner.buffer {
            Buffer::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.inner.buffer {
            Buffer::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.inner.buffer {
            Buffer::U8(v) => Some(v),
            _ => None,
        }
    }

    /// Whether both handles share the same storage.
    pub fn ptr_eq(&self, other: &Allocation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Content equality: same type and same lanes.
impl PartialEq for Allocation {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.inner.ty == other.inner.ty && self.inner.buffer == other.inner.buffer)
    }
}

fn lane_count(ty: &Type) -> Result<usize, GraphError> {
    ty.lane_count().ok_or_else(|| {
        GraphError::InvalidAllocation(format!("type {ty} is too large to allocate"))
    })
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("id", &self.inner.id)
            .field("ty", &self.inner.ty)
            .field("lanes", &self.inner.buffer.len())
            .finish()
    }
}
