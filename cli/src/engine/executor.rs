//! Plan executor.
//!
//! Every node becomes one future polled concurrently on the calling task.
//! A node waits for all of its predecessors; if any of them fails or is
//! skipped, the node is skipped with that same cause and its action never
//! runs. Independent subtrees keep going and nothing is rolled back.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use futures_util::future;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use tokio::time::Instant;
use tracing::Instrument;

use crate::engine::deferred::{Deferred, Failure};
use crate::engine::exports::Exports;
use crate::engine::graph::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Started,
    Finished,
    Failed,
    Skipped,
}

/// One entry in the execution trace, in the order it happened.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub node: String,
    pub phase: Phase,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub enum NodeStatus {
    Succeeded,
    Failed(Failure),
    /// Not attempted because a predecessor did not succeed.
    Skipped(Failure),
}

/// Per-node outcome and ordered trace of a finished run.
#[derive(Debug, Default)]
pub struct RunReport {
    statuses: Vec<(String, NodeStatus)>,
    trace: Vec<TraceEvent>,
}

impl RunReport {
    #[must_use]
    pub fn status(&self, node: &str) -> Option<&NodeStatus> {
        self.statuses
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, status)| status)
    }

    #[must_use]
    pub fn statuses(&self) -> &[(String, NodeStatus)] {
        &self.statuses
    }

    #[must_use]
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Index in the trace of `node` reaching `phase`.
    #[must_use]
    pub fn position(&self, node: &str, phase: Phase) -> Option<usize> {
        self.trace
            .iter()
            .position(|e| e.node == node && e.phase == phase)
    }

    /// `true` if the node's action was started.
    #[must_use]
    pub fn started(&self, node: &str) -> bool {
        self.position(node, Phase::Started).is_some()
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.statuses
            .iter()
            .all(|(_, status)| matches!(status, NodeStatus::Succeeded))
    }

    /// The earliest failure in trace order, i.e. the originating error.
    #[must_use]
    pub fn first_failure(&self) -> Option<&Failure> {
        let event = self.trace.iter().find(|e| e.phase == Phase::Failed)?;
        match self.status(&event.node)? {
            NodeStatus::Failed(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Result object of [`Plan::run`]: the report and the export table.
#[derive(Debug)]
pub struct Deployment {
    pub report: RunReport,
    pub exports: Exports,
}

impl Deployment {
    /// Resolve every export, or return the originating failure verbatim.
    ///
    /// # Errors
    ///
    /// Returns the first node failure of the run, or the failure of an export
    /// that could not be resolved.
    pub async fn into_outputs(self) -> Result<BTreeMap<String, String>, Failure> {
        if let Some(cause) = self.report.first_failure() {
            return Err(cause.clone());
        }
        self.exports.resolve_all().await
    }
}

impl Plan {
    /// Execute the plan, respecting every recorded edge.
    pub async fn run(self) -> Deployment {
        self.run_observed(|_, _| {}).await
    }

    /// Like [`Plan::run`], calling `on_settle` as each node succeeds, fails
    /// or is skipped, in the order that happens.
    pub async fn run_observed(self, on_settle: impl Fn(&str, &NodeStatus)) -> Deployment {
        let Plan {
            graph,
            slots,
            exports,
            ..
        } = self;

        let dones: Vec<Deferred<()>> = slots.iter().map(|slot| slot.done.clone()).collect();
        let trace: Rc<RefCell<Vec<TraceEvent>>> = Rc::default();
        let on_settle = &on_settle;

        let tasks = slots.into_iter().enumerate().map(|(index, slot)| {
            let id = NodeIndex::new(index);
            let name = graph[id].name.clone();
            let kind = graph[id].kind;
            let preds: Vec<Deferred<()>> = graph
                .neighbors_directed(id, Direction::Incoming)
                .map(|pred| dones[pred.index()].clone())
                .collect();
            let trace = Rc::clone(&trace);
            let span = tracing::info_span!("node", name = %name, %kind);

            async move {
                let record = |phase| {
                    trace.borrow_mut().push(TraceEvent {
                        node: name.clone(),
                        phase,
                        at: Instant::now(),
                    });
                };

                let waiting = preds.iter().map(|pred| pred.resolve());
                let status = match future::try_join_all(waiting).await {
                    Err(cause) => {
                        tracing::warn!(%cause, "skipped");
                        record(Phase::Skipped);
                        slot.job.skip(cause.clone());
                        NodeStatus::Skipped(cause)
                    }
                    Ok(_) => {
                        tracing::info!("started");
                        record(Phase::Started);
                        match slot.job.run().await {
                            Ok(()) => {
                                tracing::info!("completed");
                                record(Phase::Finished);
                                NodeStatus::Succeeded
                            }
                            Err(cause) => {
                                tracing::error!(%cause, "failed");
                                record(Phase::Failed);
                                NodeStatus::Failed(cause)
                            }
                        }
                    }
                };
                on_settle(&name, &status);
                (name, status)
            }
            .instrument(span)
        });

        let statuses = future::join_all(tasks).await;
        let trace = Rc::try_unwrap(trace)
            .map(RefCell::into_inner)
            .unwrap_or_else(|shared| shared.borrow().clone());

        Deployment {
            report: RunReport { statuses, trace },
            exports,
        }
    }
}
