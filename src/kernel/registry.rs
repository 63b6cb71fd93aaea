use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use super::executor::Kernel;
use super::signature::{FieldId, KernelId, KernelSignature, Param};
use crate::error::GraphError;

/// Registered kernel: its id, the signature captured at registration and the
/// implementation.
pub struct KernelDescriptor {
    id: KernelId,
    signature: KernelSignature,
    kernel: Arc<dyn Kernel>,
}

impl KernelDescriptor {
    pub fn id(&self) -> KernelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &KernelSignature {
        &self.signature
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    /// Resolve a global field by name.
    pub fn field(&self, name: &str) -> Result<FieldId, GraphError> {
        self.signature
            .field_index(name)
            .and_then(|index| u32::try_from(index).ok())
            .map(|index| FieldId::new(self.id, index))
            .ok_or_else(|| GraphError::UnknownField {
                kernel: self.signature.name.clone(),
                field: name.to_string(),
            })
    }

    /// Declaration of a field id belonging to this kernel.
    pub fn field_param(&self, field: FieldId) -> Option<&Param> {
        if field.kernel() != self.id {
            return None;
        }
        self.signature.fields.get(field.index())
    }

    pub fn field_name(&self, field: FieldId) -> String {
        self.field_param(field)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| field.to_string())
    }
}

impl fmt::Debug for KernelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelDescriptor")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    kernels: Vec<Arc<KernelDescriptor>>,
    by_name: HashMap<String, KernelId>,
}

/// 内核注册表 - maps kernel ids to their descriptors.
///
/// Kernels are resolved by id when closures are added to a builder, so graph
/// execution never looks anything up by name. Ids are only valid in the
/// registry that issued them.
pub struct KernelRegistry {
    id: Uuid,
    state: RwLock<RegistryState>,
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Register a kernel and return its id. A later registration under the
    /// same name takes over name lookups; earlier ids stay valid.
    pub fn register(&self, kernel: Arc<dyn Kernel>) -> KernelId {
        let signature = kernel.signature();
        let mut state = self.state.write();
        let id = KernelId::new(self.id, state.kernels.len() as u32);
        if let Some(previous) = state.by_name.insert(signature.name.clone(), id) {
            tracing::warn!(
                kernel = %signature.name,
                %previous,
                %id,
                "kernel name registered twice; name lookups now resolve to the newer kernel"
            );
        }
        tracing::debug!(kernel = %signature.name, %id, "kernel registered");
        state.kernels.push(Arc::new(KernelDescriptor {
            id,
            signature,
            kernel,
        }));
        id
    }

    pub fn get(&self, id: KernelId) -> Option<Arc<KernelDescriptor>> {
        if id.registry() != self.id {
            return None;
        }
        self.state.read().kernels.get(id.index()).cloned()
    }

    pub fn resolve(&self, id: KernelId) -> Result<Arc<KernelDescriptor>, GraphError> {
        self.get(id).ok_or(GraphError::KernelNotFound(id))
    }

    pub fn lookup(&self, name: &str) -> Option<KernelId> {
        self.state.read().by_name.get(name).copied()
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.state.read().kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
