use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use crate::graph::ClosureId;

/// Execution event, delivered synchronously to every registered observer.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    ExecutionStarted {
        graph_id: Uuid,
        graph_name: String,
        execution_id: Uuid,
        inputs: usize,
    },
    BatchStarted {
        execution_id: Uuid,
        batch: usize,
        closures: usize,
    },
    ClosureStarted {
        execution_id: Uuid,
        closure: ClosureId,
        kernel: String,
        batch: usize,
    },
    ClosureFinished {
        execution_id: Uuid,
        closure: ClosureId,
        kernel: String,
        elapsed_micros: u64,
    },
    ClosureFailed {
        execution_id: Uuid,
        closure: ClosureId,
        kernel: String,
        error: String,
    },
    ExecutionFinished {
        execution_id: Uuid,
        outputs: usize,
        elapsed_micros: u64,
    },
    ExecutionFailed {
        execution_id: Uuid,
        error: String,
    },
}

/// Receives [`GraphEvent`]s from every graph executed under a context.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &GraphEvent);

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "observer"
    }
}

/// Fan-out of events to the observers registered on a context.
#[derive(Clone, Default)]
pub struct EventEmitter {
    observers: Arc<RwLock<Vec<Arc<dyn ExecutionObserver>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn ExecutionObserver>) {
        tracing::debug!(observer = observer.name(), "execution observer subscribed");
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_active(&self) -> bool {
        !self.observers.read().is_empty()
    }

    pub fn emit(&self, event: GraphEvent) {
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_event(&event);
        }
    }
}

/// Observer that keeps every event it receives.
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<GraphEvent>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// Closures in the order they started, across all recorded executions.
    pub fn closure_order(&self) -> Vec<ClosureId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                GraphEvent::ClosureStarted { closure, .. } => Some(*closure),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ExecutionObserver for EventRecorder {
    fn on_event(&self, event: &GraphEvent) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &str {
        "event-recorder"
    }
}
