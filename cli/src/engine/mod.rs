//! Deployment engine: deferred values, the dependency graph builder, the
//! executor and the export table.
//!
//! The engine knows nothing about clouds or shells: nodes are opaque async
//! actions. Imports only from `crate::domain`.

pub mod deferred;
pub mod executor;
pub mod exports;
pub mod graph;

pub use deferred::{Deferred, Failure, Settled};
pub use executor::{Deployment, NodeStatus, Phase, RunReport, TraceEvent};
pub use exports::Exports;
pub use graph::{Needs, Node, NodeId, NodeKind, Plan, PlanId, PlannedNode};
