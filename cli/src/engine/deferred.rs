//! Deferred values: handles to results that a graph node produces later.
//!
//! A [`Deferred<T>`] wraps a shared, lazily-polled future. Transformations
//! ([`Deferred::map`], [`Deferred::try_map`], [`Deferred::combine`]) build new
//! futures on top without blocking the caller. Each deferred also remembers
//! which graph nodes it was derived from so that declaring a node with a
//! deferred input records the ordering edge automatically.
//!
//! Failures are shared: a [`Failure`] is an `Arc` around the originating
//! [`DeployError`], so every value derived from a failed one fails with the
//! very same cause.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use futures_util::future::{self, FutureExt, LocalBoxFuture, Shared};
use tokio::sync::oneshot;

use crate::domain::DeployError;
use crate::engine::NodeId;

/// The shared cause of a failed deferred value.
#[derive(Clone)]
pub struct Failure(Arc<DeployError>);

impl Failure {
    #[must_use]
    pub fn cause(&self) -> &DeployError {
        &self.0
    }

    /// `true` when both failures originate from the same error instance.
    #[must_use]
    pub fn same_cause(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<DeployError> for Failure {
    fn from(err: DeployError) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Outcome of a deferred value once it settles.
pub type Settled<T> = Result<T, Failure>;

/// A value that becomes available once the node producing it completes.
pub struct Deferred<T> {
    future: Shared<LocalBoxFuture<'static, Settled<T>>>,
    deps: Rc<BTreeSet<NodeId>>,
}

impl<T: Clone> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            deps: Rc::clone(&self.deps),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("dependencies", &self.deps)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    fn from_future(
        fut: impl Future<Output = Settled<T>> + 'static,
        deps: Rc<BTreeSet<NodeId>>,
    ) -> Self {
        Self {
            future: fut.boxed_local().shared(),
            deps,
        }
    }

    /// A value known at declaration time. Carries no dependencies.
    pub fn known(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)), Rc::default())
    }

    /// A value that has already failed with `cause`.
    pub fn failed(cause: impl Into<Failure>) -> Self {
        Self::from_future(future::ready(Err(cause.into())), Rc::default())
    }

    /// An unresolved value owned by node `owner`, settled through the
    /// returned [`Resolver`].
    pub(crate) fn pending(owner: NodeId, name: &str) -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        let node = name.to_owned();
        let fut = async move {
            match rx.await {
                Ok(settled) => settled,
                Err(_) => Err(Failure::from(DeployError::Abandoned { node })),
            }
        };
        let deps = Rc::new(BTreeSet::from([owner]));
        (Resolver { tx }, Self::from_future(fut, deps))
    }

    /// Derive a value by applying `f` once this one resolves.
    pub fn map<U: Clone + 'static>(&self, f: impl FnOnce(T) -> U + 'static) -> Deferred<U> {
        let upstream = self.future.clone();
        Deferred::from_future(
            async move { upstream.await.map(f) },
            Rc::clone(&self.deps),
        )
    }

    /// Like [`map`](Self::map), but `f` may reject the value. The rejection
    /// becomes the shared failure of the derived value.
    pub fn try_map<U: Clone + 'static>(
        &self,
        f: impl FnOnce(T) -> Result<U, DeployError> + 'static,
    ) -> Deferred<U> {
        let upstream = self.future.clone();
        Deferred::from_future(
            async move { f(upstream.await?).map_err(Failure::from) },
            Rc::clone(&self.deps),
        )
    }

    /// Resolve once both `a` and `b` resolve; fails with whichever fails first.
    pub fn combine<U, V>(
        a: &Deferred<T>,
        b: &Deferred<U>,
        f: impl FnOnce(T, U) -> V + 'static,
    ) -> Deferred<V>
    where
        U: Clone + 'static,
        V: Clone + 'static,
    {
        let (left, right) = (a.future.clone(), b.future.clone());
        let deps: BTreeSet<NodeId> = a.deps.union(&b.deps).copied().collect();
        Deferred::from_future(
            async move {
                let (x, y) = future::try_join(left, right).await?;
                Ok(f(x, y))
            },
            Rc::new(deps),
        )
    }

    /// Wait for the value.
    ///
    /// # Errors
    ///
    /// Returns the shared [`Failure`] of the node this value derives from.
    pub async fn resolve(&self) -> Settled<T> {
        self.future.clone().await
    }

    /// Poll once without waiting; `None` while still pending.
    #[must_use]
    pub fn now_or_never(&self) -> Option<Settled<T>> {
        self.future.clone().now_or_never()
    }

    /// Nodes this value was derived from.
    pub fn dependencies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.deps.iter().copied()
    }
}

/// Write side of a pending [`Deferred`], held by the producing node.
pub(crate) struct Resolver<T> {
    tx: oneshot::Sender<Settled<T>>,
}

impl<T> Resolver<T> {
    pub(crate) fn settle(self, outcome: Settled<T>) {
        // Nobody may be listening; that is fine.
        let _ = self.tx.send(outcome);
    }
}
