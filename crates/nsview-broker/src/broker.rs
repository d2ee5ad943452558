//! The publish/subscribe broker and its registry state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use nsview_model::ChangeEvent;

use crate::config::BrokerConfig;
use crate::subscription::{Subscription, SubscriptionId};

/// The namespace partition a subscription listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Events for one concrete namespace.
    Namespace(String),
    /// Every event regardless of namespace. Used by heartbeats and
    /// cluster-wide viewers.
    All,
}

impl Scope {
    /// Scope for a concrete namespace.
    #[must_use]
    pub fn namespace(ns: impl Into<String>) -> Self {
        Self::Namespace(ns.into())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespace(ns) => f.write_str(ns),
            Self::All => f.write_str("*"),
        }
    }
}

/// Registry state, owned exclusively by the broker.
///
/// Rebuilt empty on startup, discarded on shutdown; mutated only through
/// register/unregister/publish.
type Registry = HashMap<Scope, HashMap<SubscriptionId, mpsc::Sender<ChangeEvent>>>;

#[derive(Debug)]
pub(crate) struct Shared {
    config: BrokerConfig,
    registry: Mutex<Registry>,
}

impl Shared {
    /// Remove one subscription. A no-op when the subscription is gone
    /// already, so teardown paths may race without harm.
    pub(crate) fn remove(&self, scope: &Scope, id: SubscriptionId) {
        let mut registry = self.registry.lock();
        if let Some(bucket) = registry.get_mut(scope) {
            if bucket.remove(&id).is_some() {
                trace!(%scope, %id, "subscription removed");
            }
            if bucket.is_empty() {
                registry.remove(scope);
            }
        }
    }
}

/// In-memory event broker with namespace-scoped fan-out.
///
/// Cheap to clone; all clones share one registry. Construct one broker
/// per process at startup and hand clones to the watch pipeline and the
/// connection layer.
#[derive(Debug, Clone)]
pub struct Broker {
    shared: Arc<Shared>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl Broker {
    /// Create a broker with the given configuration.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The broker configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    /// Register a new subscription under the given scope.
    ///
    /// The returned [`Subscription`] owns the receiving half of a
    /// bounded delivery channel and unregisters itself when dropped, so
    /// every connection exit path releases its registry entry.
    #[must_use]
    pub fn register(&self, scope: Scope) -> Subscription {
        let id = SubscriptionId::from(Uuid::new_v4());
        let (tx, rx) = mpsc::channel(self.shared.config.channel_capacity);

        self.shared
            .registry
            .lock()
            .entry(scope.clone())
            .or_default()
            .insert(id, tx);

        debug!(%scope, %id, "subscription registered");
        Subscription::new(id, scope, rx, Arc::clone(&self.shared))
    }

    /// Remove a subscription explicitly.
    ///
    /// Equivalent to dropping it; unregistering a subscription that is
    /// already gone is a no-op.
    pub fn unregister(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Deliver an event to every subscription scoped to `namespace`,
    /// plus every all-scope subscription. Returns the number of
    /// subscribers the event was handed to.
    ///
    /// Never blocks: a subscriber whose channel is full has this event
    /// dropped (drop-newest) and stays registered; a subscriber whose
    /// receiver is gone is pruned from the registry.
    pub fn publish(&self, namespace: &str, event: &ChangeEvent) -> usize {
        self.deliver(Some(namespace), event)
    }

    /// Deliver an event to every registered subscription regardless of
    /// scope. Used by the heartbeat.
    pub fn publish_to_all(&self, event: &ChangeEvent) -> usize {
        self.deliver(None, event)
    }

    fn deliver(&self, namespace: Option<&str>, event: &ChangeEvent) -> usize {
        // Snapshot matching senders under the lock, send outside it so a
        // slow consumer can never extend the critical section.
        let targets: Vec<(Scope, SubscriptionId, mpsc::Sender<ChangeEvent>)> = {
            let registry = self.shared.registry.lock();
            registry
                .iter()
                .filter(|(scope, _)| match (namespace, scope) {
                    (None, _) | (_, Scope::All) => true,
                    (Some(ns), Scope::Namespace(sub_ns)) => sub_ns.as_str() == ns,
                })
                .flat_map(|(scope, bucket)| {
                    bucket
                        .iter()
                        .map(|(id, tx)| (scope.clone(), *id, tx.clone()))
                })
                .collect()
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (scope, id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%scope, %id, kind = %event.kind, "subscriber channel full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push((scope, id));
                }
            }
        }

        for (scope, id) in closed {
            self.shared.remove(&scope, id);
        }

        delivered
    }

    /// Number of registered subscriptions for one scope.
    #[must_use]
    pub fn subscriber_count(&self, scope: &Scope) -> usize {
        self.shared
            .registry
            .lock()
            .get(scope)
            .map_or(0, HashMap::len)
    }

    /// Total number of registered subscriptions across all scopes.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.shared
            .registry
            .lock()
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Spawn the heartbeat task.
    ///
    /// Publishes a heartbeat event to every subscriber once per
    /// configured interval for the lifetime of the process. Abort the
    /// returned handle to stop it.
    pub fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let broker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(broker.shared.config.heartbeat_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; skip it so heartbeats
            // start one interval after spawn.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let delivered = broker.publish_to_all(&ChangeEvent::heartbeat());
                trace!(delivered, "heartbeat published");
            }
        })
    }
}
