//! Dependency graph builder.
//!
//! A [`Plan`] records nodes and their ordering constraints up front; nothing
//! runs until [`Plan::run`](crate::engine::Plan::run). Each declared node gets
//! a [`Node<T>`] handle whose [`outputs`](Node::outputs) deferred resolves when
//! the node's action completes.
//!
//! Edges come from two places:
//! * explicit: `Needs::after(&node)`, "run after this node";
//! * implicit: `Needs::input(&deferred)`, every node the deferred was
//!   derived from.
//!
//! Nodes can only reference nodes declared before them, so the graph is
//! acyclic by construction.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{FutureExt, LocalBoxFuture};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::domain::DeployError;
use crate::engine::deferred::{Deferred, Failure, Resolver, Settled};
use crate::engine::exports::Exports;

/// Identity of one [`Plan`]; no two plans in a process share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanId(u64);

impl PlanId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A node, qualified by the plan that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    plan: PlanId,
    index: NodeIndex,
}

impl NodeId {
    #[must_use]
    pub fn plan(self) -> PlanId {
        self.plan
    }

    /// Position in declaration order within the owning plan.
    #[must_use]
    pub fn index(self) -> usize {
        self.index.index()
    }

    #[cfg(test)]
    pub(crate) fn unplanned(index: usize) -> Self {
        Self {
            plan: PlanId(u64::MAX),
            index: NodeIndex::new(index),
        }
    }
}

/// What a node does, used for validation and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Read-only query against the provider.
    Lookup,
    /// Remote infrastructure created through the provider.
    Resource,
    /// Work done on the local machine (waiting, probing).
    Local,
    /// A step executed over the remote shell.
    Remote,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Resource => "resource",
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Explicit,
    Implicit,
}

#[derive(Debug)]
pub(crate) struct NodeMeta {
    pub name: String,
    pub kind: NodeKind,
}

/// Handle to a declared node.
#[derive(Debug)]
pub struct Node<T> {
    id: NodeId,
    outputs: Deferred<T>,
}

impl<T: Clone> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            outputs: self.outputs.clone(),
        }
    }
}

impl<T> Node<T> {
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's result, resolved once its action completes.
    #[must_use]
    pub fn outputs(&self) -> &Deferred<T> {
        &self.outputs
    }
}

/// Ordering constraints for a node being declared.
#[derive(Debug, Default, Clone)]
pub struct Needs {
    after: BTreeSet<NodeId>,
    inputs: BTreeSet<NodeId>,
}

impl Needs {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Run only after `node` has completed.
    #[must_use]
    pub fn after<T>(mut self, node: &Node<T>) -> Self {
        self.after.insert(node.id);
        self
    }

    /// The action consumes `value`; depend on every node it derives from.
    #[must_use]
    pub fn input<T: Clone + 'static>(mut self, value: &Deferred<T>) -> Self {
        self.inputs.extend(value.dependencies());
        self
    }
}

// ── Jobs ──────────────────────────────────────────────────────────────────────

/// Type-erased node action, run or skipped exactly once by the executor.
pub(crate) trait Job {
    fn run(self: Box<Self>) -> LocalBoxFuture<'static, Result<(), Failure>>;
    fn skip(self: Box<Self>, cause: Failure);
}

struct Action<T, F> {
    resolver: Resolver<T>,
    action: F,
}

impl<T, F, Fut> Job for Action<T, F>
where
    T: 'static,
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Settled<T>> + 'static,
{
    fn run(self: Box<Self>) -> LocalBoxFuture<'static, Result<(), Failure>> {
        let Self { resolver, action } = *self;
        async move {
            match action().await {
                Ok(value) => {
                    resolver.settle(Ok(value));
                    Ok(())
                }
                Err(cause) => {
                    resolver.settle(Err(cause.clone()));
                    Err(cause)
                }
            }
        }
        .boxed_local()
    }

    fn skip(self: Box<Self>, cause: Failure) {
        self.resolver.settle(Err(cause));
    }
}

pub(crate) struct Slot {
    pub job: Box<dyn Job>,
    /// Settles when the node completes, fails or is skipped.
    pub done: Deferred<()>,
}

// ── Plan ──────────────────────────────────────────────────────────────────────

/// One row of [`Plan::steps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNode {
    pub name: String,
    pub kind: NodeKind,
    pub after: Vec<String>,
}

/// The deployment graph under construction, plus its export table.
pub struct Plan {
    id: PlanId,
    pub(crate) graph: DiGraph<NodeMeta, Edge>,
    /// Indexed like `graph`; nodes are never removed.
    pub(crate) slots: Vec<Slot>,
    names: HashMap<String, NodeIndex>,
    pub(crate) exports: Exports,
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

impl Plan {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: PlanId::next(),
            graph: DiGraph::new(),
            slots: Vec::new(),
            names: HashMap::new(),
            exports: Exports::default(),
        }
    }

    /// Register a node and return immediately with its unresolved outputs.
    ///
    /// `action` is not called here; the executor calls it once every
    /// predecessor has completed successfully.
    ///
    /// # Errors
    ///
    /// * [`DeployError::DuplicateName`] if `name` is already declared;
    /// * [`DeployError::UnknownPredecessor`] for a handle from another plan;
    /// * [`DeployError::ChainViolation`] if a [`NodeKind::Remote`] node would
    ///   follow more than one remote node.
    pub fn declare<T, F, Fut>(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        needs: Needs,
        action: F,
    ) -> Result<Node<T>, DeployError>
    where
        T: Clone + 'static,
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Settled<T>> + 'static,
    {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(DeployError::DuplicateName(name));
        }

        let foreign = needs
            .inputs
            .iter()
            .chain(&needs.after)
            .any(|id| id.plan != self.id || self.graph.node_weight(id.index).is_none());
        if foreign {
            return Err(DeployError::UnknownPredecessor { node: name });
        }

        let mut preds: BTreeMap<NodeIndex, Edge> = needs
            .inputs
            .into_iter()
            .map(|id| (id.index, Edge::Implicit))
            .collect();
        preds.extend(needs.after.into_iter().map(|id| (id.index, Edge::Explicit)));

        if kind == NodeKind::Remote {
            let remote: Vec<String> = preds
                .keys()
                .map(|id| &self.graph[*id])
                .filter(|meta| meta.kind == NodeKind::Remote)
                .map(|meta| meta.name.clone())
                .collect();
            if remote.len() > 1 {
                return Err(DeployError::ChainViolation {
                    step: name,
                    predecessors: remote,
                });
            }
        }

        let index = self.graph.add_node(NodeMeta {
            name: name.clone(),
            kind,
        });
        for (pred, edge) in preds {
            self.graph.add_edge(pred, index, edge);
        }

        let id = NodeId {
            plan: self.id,
            index,
        };
        let (resolver, outputs) = Deferred::pending(id, &name);
        let done = outputs.map(|_| ());
        self.slots.push(Slot {
            job: Box::new(Action { resolver, action }),
            done,
        });
        tracing::debug!(node = %name, %kind, "declared");
        self.names.insert(name, index);

        Ok(Node { id, outputs })
    }

    /// Append a named output to the export table.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::DuplicateExport`] if `name` is taken.
    pub fn export(
        &mut self,
        name: impl Into<String>,
        value: Deferred<String>,
    ) -> Result<(), DeployError> {
        self.exports.insert(name, value)
    }

    #[must_use]
    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Names of the direct predecessors of `name`, in declaration order.
    #[must_use]
    pub fn predecessors(&self, name: &str) -> Option<Vec<String>> {
        let id = *self.names.get(name)?;
        Some(self.predecessor_names(id))
    }

    /// Every node in declaration order with its predecessors.
    #[must_use]
    pub fn steps(&self) -> Vec<PlannedNode> {
        self.graph
            .node_indices()
            .map(|id| {
                let meta = &self.graph[id];
                PlannedNode {
                    name: meta.name.clone(),
                    kind: meta.kind,
                    after: self.predecessor_names(id),
                }
            })
            .collect()
    }

    #[must_use]
    pub fn id(&self) -> PlanId {
        self.id
    }

    fn predecessor_names(&self, id: NodeIndex) -> Vec<String> {
        let mut preds: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(id, Direction::Incoming)
            .collect();
        preds.sort();
        preds
            .into_iter()
            .map(|p| self.graph[p].name.clone())
            .collect()
    }
}

/// Mermaid flowchart; explicit edges solid, implicit (data) edges dotted.
impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for id in self.graph.node_indices() {
            let meta = &self.graph[id];
            let name = meta.name.replace('"', "\\\"");
            writeln!(f, "    {}[\"{} ({})\"]", id.index(), name, meta.kind)?;
        }

        for edge in self.graph.edge_indices() {
            let Some((source, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let arrow = match self.graph[edge] {
                Edge::Explicit => "-->",
                Edge::Implicit => "-.->",
            };
            writeln!(f, "    {} {arrow} {}", source.index(), target.index())?;
        }

        Ok(())
    }
}
