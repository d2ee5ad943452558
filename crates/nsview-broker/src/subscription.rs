//! Subscription handles returned by the broker.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use nsview_model::ChangeEvent;

use crate::broker::{Scope, Shared};

/// Opaque identifier for one registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl From<Uuid> for SubscriptionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Removes the registry entry when the subscription goes away, on any
/// exit path.
#[derive(Debug)]
pub(crate) struct ReleaseGuard {
    id: SubscriptionId,
    scope: Scope,
    shared: Arc<Shared>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.shared.remove(&self.scope, self.id);
    }
}

/// A registered viewer's delivery channel plus its namespace scope.
///
/// Owns the receiving half of the bounded channel the broker delivers
/// into. Dropping the subscription unregisters it; no explicit teardown
/// call is required on error paths.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    scope: Scope,
    rx: mpsc::Receiver<ChangeEvent>,
    _release: ReleaseGuard,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        scope: Scope,
        rx: mpsc::Receiver<ChangeEvent>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            scope: scope.clone(),
            rx,
            _release: ReleaseGuard { id, scope, shared },
        }
    }

    /// This subscription's identifier.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The scope this subscription was registered under.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Wait for the next delivered event.
    ///
    /// Returns `None` once the broker side of the channel is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    #[cfg(test)]
    pub(crate) fn into_parts_for_test(self) -> (mpsc::Receiver<ChangeEvent>, ReleaseGuard) {
        (self.rx, self._release)
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
