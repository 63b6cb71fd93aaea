//! Finalized graphs and their execution.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{
    ConcreteValue, Context, Domain, Future, FutureTarget, GraphEvent, UnboundValue, Value,
};
use crate::error::{GraphError, KernelError};
use crate::kernel::{KernelKind, LaunchArgs};

use super::closure::{Closure, ClosureId};
use super::topology::DependencyGraph;
use super::validator;

/// A run of consecutive closures that could be dispatched together: no
/// closure reads a global written inside the batch, all share one launch
/// domain, and invoke closures always run alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub closures: Vec<ClosureId>,
}

/// Timing of one closure within an execution.
#[derive(Debug, Clone)]
pub struct ClosureTiming {
    pub closure: ClosureId,
    pub kernel: String,
    pub batch: usize,
    pub elapsed: Duration,
}

/// Everything observed during one execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub execution_id: Uuid,
    pub outputs: Vec<ConcreteValue>,
    /// Closures in the order they ran.
    pub order: Vec<ClosureId>,
    pub timings: Vec<ClosureTiming>,
    pub elapsed: Duration,
}

/// Serializable summary of a graph, for logs and tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub id: Uuid,
    pub name: String,
    pub inputs: Vec<InputDescription>,
    pub closures: Vec<ClosureDescription>,
    pub outputs: Vec<String>,
    pub batches: Vec<Batch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescription {
    pub slot: usize,
    pub declared: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureDescription {
    pub id: ClosureId,
    pub kernel: String,
    pub invoke: bool,
    pub domain: Option<Domain>,
    pub args: Vec<String>,
    pub bindings: Vec<(String, String)>,
    pub dependencies: Vec<ClosureId>,
}

/// Values produced by one closure during one execution.
struct ClosureResult {
    ret: Option<ConcreteValue>,
    /// Global field values after the closure ran, by field index.
    globals: Vec<Option<ConcreteValue>>,
}

/// An immutable, executable closure graph.
///
/// Created by [`GraphBuilder::create`](super::GraphBuilder::create). `execute`
/// takes `&self` and keeps all per-execution state on its own stack, so one
/// graph may be executed any number of times, including from several threads.
pub struct Graph {
    id: Uuid,
    name: String,
    context: Context,
    inputs: Vec<UnboundValue>,
    /// Closures in execution order.
    closures: Vec<Closure>,
    /// `closure id -> position in closures`, for every id the builder handed
    /// out; pruned ids map to `None`.
    positions: Vec<Option<usize>>,
    outputs: Vec<Future>,
    batches: Vec<Batch>,
    /// `closure position -> batch index`
    batch_of: Vec<usize>,
    topology: DependencyGraph,
}

impl Graph {
    pub(crate) fn new(
        context: Context,
        name: Option<String>,
        inputs: Vec<UnboundValue>,
        closures: Vec<Closure>,
        outputs: Vec<Future>,
    ) -> Result<Self, GraphError> {
        let id = Uuid::new_v4();
        let name = name.unwrap_or_else(|| format!("graph-{}", &id.simple().to_string()[..8]));
        let slots = closures.len();

        let mut topology = DependencyGraph::build(&closures)?;
        topology.verify_order()?;

        let closures = if context.config().prune_unused_closures {
            let roots: Vec<ClosureId> = outputs.iter().map(|f| f.closure).collect();
            let keep = topology.ancestors(&roots);
            let before = closures.len();
            let kept: Vec<Closure> = closures
                .into_iter()
                .filter(|c| keep.contains(&c.id()))
                .collect();
            if kept.len() != before {
                tracing::debug!(
                    graph = %name,
                    pruned = before - kept.len(),
                    "unused closures pruned"
                );
                topology = DependencyGraph::build(&kept)?;
            }
            kept
        } else {
            closures
        };

        let mut positions = vec![None; slots];
        for (position, closure) in closures.iter().enumerate() {
            positions[closure.id().index()] = Some(position);
        }

        let batches = if context.config().plan_batches {
            plan_batches(&closures, &topology)
        } else {
            closures
                .iter()
                .enumerate()
                .map(|(index, c)| Batch {
                    index,
                    closures: vec![c.id()],
                })
                .collect()
        };
        let mut batch_of = vec![0; closures.len()];
        for batch in &batches {
            for id in &batch.closures {
                if let Some(position) = positions[id.index()] {
                    batch_of[position] = batch.index;
                }
            }
        }

        tracing::info!(
            graph = %name,
            graph_id = %id,
            inputs = inputs.len(),
            closures = closures.len(),
            outputs = outputs.len(),
            batches = batches.len(),
            "graph created"
        );

        Ok(Self {
            id,
            name,
            context,
            inputs,
            closures,
            positions,
            outputs,
            batches,
            batch_of,
            topology,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Closures in execution order.
    pub fn closures(&self) -> &[Closure] {
        &self.closures
    }

    pub fn closure(&self, id: ClosureId) -> Option<&Closure> {
        self.position(id).map(|p| &self.closures[p])
    }

    fn position(&self, id: ClosureId) -> Option<usize> {
        self.positions.get(id.index()).copied().flatten()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn outputs(&self) -> &[Future] {
        &self.outputs
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn dependencies(&self, id: ClosureId) -> Vec<ClosureId> {
        self.topology.dependencies(id)
    }

    pub fn dependents(&self, id: ClosureId) -> Vec<ClosureId> {
        self.topology.dependents(id)
    }

    pub fn topology(&self) -> &DependencyGraph {
        &self.topology
    }

    pub fn to_dot(&self) -> String {
        self.topology.to_dot()
    }

    pub fn describe(&self) -> GraphDescription {
        GraphDescription {
            id: self.id,
            name: self.name.clone(),
            inputs: self
                .inputs
                .iter()
                .map(|input| InputDescription {
                    slot: input.slot,
                    declared: input.declared.map(|ty| ty.to_string()),
                })
                .collect(),
            closures: self
                .closures
                .iter()
                .map(|closure| ClosureDescription {
                    id: closure.id(),
                    kernel: closure.kernel_name().to_string(),
                    invoke: closure.is_invoke(),
                    domain: closure.domain(),
                    args: closure.args().iter().map(Value::describe).collect(),
                    bindings: closure
                        .bindings()
                        .iter()
                        .map(|b| (closure.kernel().field_name(b.field), b.value.describe()))
                        .collect(),
                    dependencies: self.topology.dependencies(closure.id()),
                })
                .collect(),
            outputs: self.outputs.iter().map(|f| f.to_string()).collect(),
            batches: self.batches.clone(),
        }
    }

    /// Run every closure once with `inputs` bound to the input slots, in
    /// declaration order, and return the outputs in `create()` order.
    pub fn execute(&self, inputs: &[ConcreteValue]) -> Result<Vec<ConcreteValue>, GraphError> {
        self.run(inputs).map(|report| report.outputs)
    }

    /// Like [`execute`](Self::execute), also reporting order and timings.
    pub fn execute_with_report(
        &self,
        inputs: &[ConcreteValue],
    ) -> Result<ExecutionReport, GraphError> {
        self.run(inputs)
    }

    fn run(&self, inputs: &[ConcreteValue]) -> Result<ExecutionReport, GraphError> {
        let execution_id = Uuid::new_v4();
        let span = tracing::info_span!("graph.execute", graph = %self.name, %execution_id);
        let _enter = span.enter();

        if let Err(e) =
            validator::check_inputs(&self.inputs, inputs, self.context.config().check_types)
        {
            tracing::warn!(error = %e, "graph inputs rejected");
            return Err(e);
        }

        let emitter = self.context.emitter();
        emitter.emit(GraphEvent::ExecutionStarted {
            graph_id: self.id,
            graph_name: self.name.clone(),
            execution_id,
            inputs: inputs.len(),
        });

        let started = Instant::now();
        let mut scratch: Vec<Option<ClosureResult>> =
            (0..self.positions.len()).map(|_| None).collect();
        let mut order = Vec::with_capacity(self.closures.len());
        let mut timings = Vec::with_capacity(self.closures.len());

        let result = self.run_batches(
            execution_id,
            inputs,
            &mut scratch,
            &mut order,
            &mut timings,
        );
        let outputs = result.and_then(|()| {
            self.outputs
                .iter()
                .map(|future| resolve_future(future, &self.closures, &self.positions, &scratch))
                .collect::<Result<Vec<_>, _>>()
        });

        let elapsed = started.elapsed();
        match outputs {
            Ok(outputs) => {
                emitter.emit(GraphEvent::ExecutionFinished {
                    execution_id,
                    outputs: outputs.len(),
                    elapsed_micros: elapsed.as_micros() as u64,
                });
                tracing::debug!(closures = order.len(), ?elapsed, "graph executed");
                Ok(ExecutionReport {
                    execution_id,
                    outputs,
                    order,
                    timings,
                    elapsed,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "graph execution failed");
                emitter.emit(GraphEvent::ExecutionFailed {
                    execution_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run_batches(
        &self,
        execution_id: Uuid,
        inputs: &[ConcreteValue],
        scratch: &mut [Option<ClosureResult>],
        order: &mut Vec<ClosureId>,
        timings: &mut Vec<ClosureTiming>,
    ) -> Result<(), GraphError> {
        let emitter = self.context.emitter();
        // Per-closure events are skipped outright when nobody listens.
        let observed = emitter.is_active();
        for batch in &self.batches {
            emitter.emit(GraphEvent::BatchStarted {
                execution_id,
                batch: batch.index,
                closures: batch.closures.len(),
            });
            for id in &batch.closures {
                let position = self.position(*id).ok_or_else(|| {
                    GraphError::Internal(format!("batch {} lists unknown closure {}", batch.index, id))
                })?;
                let closure = &self.closures[position];
                if observed {
                    emitter.emit(GraphEvent::ClosureStarted {
                        execution_id,
                        closure: *id,
                        kernel: closure.kernel_name().to_string(),
                        batch: batch.index,
                    });
                }
                tracing::trace!(closure = %id, kernel = closure.kernel_name(), batch = batch.index, "dispatching closure");

                let started = Instant::now();
                match self.run_closure(closure, inputs, scratch) {
                    Ok(result) => {
                        let elapsed = started.elapsed();
                        if observed {
                            emitter.emit(GraphEvent::ClosureFinished {
                                execution_id,
                                closure: *id,
                                kernel: closure.kernel_name().to_string(),
                                elapsed_micros: elapsed.as_micros() as u64,
                            });
                        }
                        scratch[id.index()] = Some(result);
                        order.push(*id);
                        timings.push(ClosureTiming {
                            closure: *id,
                            kernel: closure.kernel_name().to_string(),
                            batch: self.batch_of[position],
                            elapsed,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(closure = %id, kernel = closure.kernel_name(), error = %e, "closure failed");
                        emitter.emit(GraphEvent::ClosureFailed {
                            execution_id,
                            closure: *id,
                            kernel: closure.kernel_name().to_string(),
                            error: e.to_string(),
                        });
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    fn run_closure(
        &self,
        closure: &Closure,
        inputs: &[ConcreteValue],
        scratch: &[Option<ClosureResult>],
    ) -> Result<ClosureResult, GraphError> {
        let descriptor = closure.kernel();
        let signature = descriptor.signature();
        let check_types = self.context.config().check_types;
        let resolve = |value: &Value| -> Result<ConcreteValue, GraphError> {
            match value {
                Value::Bound(concrete) => Ok(concrete.clone()),
                Value::Unbound(unbound) => inputs.get(unbound.slot).cloned().ok_or_else(|| {
                    GraphError::Internal(format!("input({}) is out of range", unbound.slot))
                }),
                Value::Future(future) => {
                    resolve_future(future, &self.closures, &self.positions, scratch)
                }
            }
        };

        let mut args = Vec::with_capacity(closure.args().len());
        for (index, value) in closure.args().iter().enumerate() {
            let concrete = resolve(value)?;
            if check_types {
                if let Some(param) = signature.args.get(index) {
                    validator::check_param(
                        &signature.name,
                        param,
                        &concrete.value_type(),
                        closure.domain(),
                        true,
                    )
                    .map_err(GraphError::at_execution)?;
                }
            }
            args.push(concrete);
        }

        let mut fields: Vec<Option<ConcreteValue>> = vec![None; signature.fields.len()];
        for binding in closure.bindings() {
            let concrete = resolve(&binding.value)?;
            if check_types {
                if let Some(param) = descriptor.field_param(binding.field) {
                    validator::check_param(
                        &signature.name,
                        param,
                        &concrete.value_type(),
                        closure.domain(),
                        false,
                    )
                    .map_err(GraphError::at_execution)?;
                }
            }
            fields[binding.field.index()] = Some(concrete);
        }

        let launch = LaunchArgs {
            kernel: descriptor.id(),
            signature,
            domain: closure.domain(),
            args: &args,
            fields: &fields,
        };
        let failed = |source: KernelError| GraphError::KernelExecution {
            closure: closure.id(),
            kernel: signature.name.clone(),
            source,
        };
        let output = descriptor.kernel().invoke(&launch).map_err(failed)?;

        let ret = match (signature.kind, closure.domain()) {
            (KernelKind::ForEach { output: fixed }, Some(domain)) => {
                let allocation = output.ret.ok_or_else(|| {
                    failed(KernelError::execution("kernel returned no allocation"))
                })?;
                let ty = allocation.ty();
                if ty.domain != domain {
                    return Err(failed(KernelError::execution(format!(
                        "returned extent {} differs from launch domain {}",
                        ty.domain, domain
                    ))));
                }
                if let Some(element) = fixed {
                    if ty.element != element {
                        return Err(failed(KernelError::execution(format!(
                            "returned {} elements, signature declares {}",
                            ty.element, element
                        ))));
                    }
                }
                Some(ConcreteValue::Allocation(allocation))
            }
            _ => {
                if output.ret.is_some() {
                    return Err(failed(KernelError::execution(
                        "invokable kernel returned an allocation",
                    )));
                }
                None
            }
        };

        for (name, value) in output.globals {
            let index = signature.field_index(&name).ok_or_else(|| {
                failed(KernelError::invalid_argument(format!(
                    "kernel wrote undeclared global '{name}'"
                )))
            })?;
            if check_types && !signature.fields[index].ty.accepts(&value.value_type()) {
                return Err(failed(KernelError::type_error(format!(
                    "global '{}' is declared {}, kernel wrote {}",
                    name,
                    signature.fields[index].ty,
                    value.value_type()
                ))));
            }
            fields[index] = Some(value);
        }

        Ok(ClosureResult {
            ret,
            globals: fields,
        })
    }
}

/// Look up the value a future refers to in the scratch table.
fn resolve_future(
    future: &Future,
    closures: &[Closure],
    positions: &[Option<usize>],
    scratch: &[Option<ClosureResult>],
) -> Result<ConcreteValue, GraphError> {
    let result = scratch
        .get(future.closure.index())
        .and_then(Option::as_ref)
        .ok_or_else(|| {
            GraphError::Internal(format!("{} was read before its closure ran", future))
        })?;
    match future.target {
        FutureTarget::Return => result
            .ret
            .clone()
            .ok_or(GraphError::NoReturnValue(future.closure)),
        FutureTarget::Global(field) => result
            .globals
            .get(field.index())
            .cloned()
            .flatten()
            .ok_or_else(|| {
                let closure = positions
                    .get(future.closure.index())
                    .copied()
                    .flatten()
                    .map(|p| &closures[p]);
                let (kernel, name) = match closure {
                    Some(c) => (c.kernel_name().to_string(), c.kernel().field_name(field)),
                    None => (String::new(), field.to_string()),
                };
                GraphError::KernelExecution {
                    closure: future.closure,
                    kernel,
                    source: KernelError::MissingField(format!(
                        "global '{name}' was neither bound nor written"
                    )),
                }
            }),
    }
}

/// Partition closures, in execution order, into batches.
///
/// A closure opens a new batch when it reads a global of a closure in the
/// current batch, when its launch domain differs from the batch's, or when it
/// or the batch is an invoke closure.
fn plan_batches(closures: &[Closure], topology: &DependencyGraph) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();
    let mut current: Vec<&Closure> = Vec::new();

    for closure in closures {
        let conflict = match current.first() {
            None => false,
            Some(first) => {
                first.is_invoke()
                    || closure.is_invoke()
                    || first.domain() != closure.domain()
                    || current
                        .iter()
                        .any(|member| topology.depends_through_global(closure.id(), member.id()))
            }
        };
        if conflict {
            batches.push(Batch {
                index: batches.len(),
                closures: current.iter().map(|c| c.id()).collect(),
            });
            current.clear();
        }
        current.push(closure);
    }
    if !current.is_empty() {
        batches.push(Batch {
            index: batches.len(),
            closures: current.iter().map(|c| c.id()).collect(),
        });
    }

    tracing::debug!(
        closures = closures.len(),
        batches = batches.len(),
        "batches planned"
    );
    batches
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs.len())
            .field("closures", &self.closures.len())
            .field("outputs", &self.outputs.len())
            .field("batches", &self.batches.len())
            .finish()
    }
}
