//! Dependency graph between closures, built once per [`Graph`](super::Graph).

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::dot::Dot;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::{FutureTarget, Value};
use crate::error::GraphError;
use crate::kernel::FieldId;

use super::closure::{Closure, ClosureId};

/// 依赖图节点
#[derive(Debug, Clone)]
pub struct ClosureNode {
    pub id: ClosureId,
    pub kernel: String,
}

impl fmt::Display for ClosureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.kernel)
    }
}

/// Where the consumer reads the produced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumer {
    Arg(usize),
    Field(FieldId),
}

/// 依赖边: producer -> consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub target: FutureTarget,
    pub consumer: Consumer,
}

impl DependencyEdge {
    /// Edges that pass data through a kernel global rather than a plain
    /// return-to-argument hand-off.
    pub fn through_global(&self) -> bool {
        matches!(self.target, FutureTarget::Global(_)) || matches!(self.consumer, Consumer::Field(_))
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            FutureTarget::Return => write!(f, "ret")?,
            FutureTarget::Global(field) => write!(f, "global{}", field.index())?,
        }
        match self.consumer {
            Consumer::Arg(i) => write!(f, " -> arg{i}"),
            Consumer::Field(field) => write!(f, " -> global{}", field.index()),
        }
    }
}

/// Closure dependency graph.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: StableDiGraph<ClosureNode, DependencyEdge>,
    index: HashMap<ClosureId, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from closures in insertion order. Futures must refer to
    /// closures in `closures`.
    pub fn build(closures: &[Closure]) -> Result<Self, GraphError> {
        let mut graph = StableDiGraph::new();
        let mut index = HashMap::with_capacity(closures.len());

        for closure in closures {
            let idx = graph.add_node(ClosureNode {
                id: closure.id(),
                kernel: closure.kernel_name().to_string(),
            });
            index.insert(closure.id(), idx);
        }

        for closure in closures {
            let to = index[&closure.id()];
            let consumers = closure
                .args()
                .iter()
                .enumerate()
                .map(|(i, v)| (Consumer::Arg(i), v))
                .chain(
                    closure
                        .bindings()
                        .iter()
                        .map(|b| (Consumer::Field(b.field), &b.value)),
                );
            for (consumer, value) in consumers {
                if let Value::Future(future) = value {
                    let from = *index.get(&future.closure).ok_or_else(|| {
                        GraphError::Internal(format!(
                            "closure {} consumes {}, which is not part of the graph",
                            closure.id(),
                            future
                        ))
                    })?;
                    graph.add_edge(
                        from,
                        to,
                        DependencyEdge {
                            target: future.target,
                            consumer,
                        },
                    );
                }
            }
        }

        Ok(Self { graph, index })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors(&self, id: ClosureId, direction: Direction) -> Vec<ClosureId> {
        let Some(idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<ClosureId> = self
            .graph
            .neighbors_directed(*idx, direction)
            .filter_map(|n| self.graph.node_weight(n).map(|node| node.id))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Closures `id` consumes results of.
    pub fn dependencies(&self, id: ClosureId) -> Vec<ClosureId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Closures consuming results of `id`.
    pub fn dependents(&self, id: ClosureId) -> Vec<ClosureId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Whether `consumer` reads anything of `producer` through a global.
    pub fn depends_through_global(&self, consumer: ClosureId, producer: ClosureId) -> bool {
        let (Some(from), Some(to)) = (self.index.get(&producer), self.index.get(&consumer)) else {
            return false;
        };
        self.graph
            .edges_directed(*to, Direction::Incoming)
            .any(|edge| edge.source() == *from && edge.weight().through_global())
    }

    /// `roots` plus every closure they transitively depend on.
    pub fn ancestors(&self, roots: &[ClosureId]) -> HashSet<ClosureId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeIndex> = roots
            .iter()
            .filter_map(|id| self.index.get(id).copied())
            .collect();
        while let Some(idx) = stack.pop() {
            let Some(node) = self.graph.node_weight(idx) else {
                continue;
            };
            if !seen.insert(node.id) {
                continue;
            }
            stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
        }
        seen
    }

    /// Check that insertion order is a topological order of the graph.
    pub fn verify_order(&self) -> Result<(), GraphError> {
        self.topological_order()?;
        for edge in self.graph.edge_indices() {
            let Some((from, to)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            if self.graph[from].id >= self.graph[to].id {
                return Err(GraphError::Internal(format!(
                    "closure {} consumes later closure {}",
                    self.graph[to].id, self.graph[from].id
                )));
            }
        }
        Ok(())
    }

    /// 拓扑排序
    pub fn topological_order(&self) -> Result<Vec<ClosureId>, GraphError> {
        let sorted = petgraph::algo::toposort(&self.graph, None)
            .map_err(|_| GraphError::Internal("closure graph has a cycle".into()))?;
        Ok(sorted
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx).map(|n| n.id))
            .collect())
    }

    /// Graphviz rendering.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.graph))
    }
}
