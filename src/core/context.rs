use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::config::EngineConfig;
use super::event_bus::{EventEmitter, ExecutionObserver};
use crate::graph::GraphBuilder;
use crate::kernel::{Kernel, KernelDescriptor, KernelId, KernelRegistry};

struct ContextInner {
    id: Uuid,
    config: EngineConfig,
    registry: KernelRegistry,
    emitter: EventEmitter,
}

/// Execution context passed explicitly to every builder.
///
/// Owns the kernel registry, the engine configuration and the observers of
/// execution events. Cloning is cheap and shares all of them; graphs keep the
/// context alive for as long as they exist.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(context = %id, ?config, "context created");
        Self {
            inner: Arc::new(ContextInner {
                id,
                config,
                registry: KernelRegistry::new(),
                emitter: EventEmitter::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.inner.registry
    }

    pub fn register_kernel(&self, kernel: Arc<dyn Kernel>) -> KernelId {
        self.inner.registry.register(kernel)
    }

    /// Register the CPU reference kernels.
    #[cfg(feature = "builtin-kernels")]
    pub fn register_builtins(&self) -> crate::kernel::BuiltinKernels {
        crate::kernel::register_builtin_kernels(&self.inner.registry)
    }

    pub fn kernel(&self, id: KernelId) -> Option<Arc<KernelDescriptor>> {
        self.inner.registry.get(id)
    }

    /// Start a new, empty graph builder bound to this context.
    pub fn builder(&self) -> GraphBuilder {
        GraphBuilder::new(self.clone())
    }

    pub fn subscribe(&self, observer: Arc<dyn ExecutionObserver>) {
        self.inner.emitter.subscribe(observer);
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.inner.emitter
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("kernels", &self.inner.registry.len())
            .field("observers", &self.inner.emitter.observer_count())
            .finish()
    }
}
