//! Normalization and publication of raw cluster notifications.

use std::sync::Arc;

use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use nsview_broker::Broker;
use nsview_model::{ChangeEvent, Resource};
use nsview_redact::RedactionPolicy;

/// A raw cluster notification before normalization.
///
/// Watcher tasks produce these on their outbound queue; the pipeline is
/// the only consumer.
#[derive(Debug, Clone)]
pub enum RawEvent {
    /// A resource appeared.
    Added(Resource),
    /// A resource changed; both the prior and current state are carried.
    Updated {
        /// The resource state before the change.
        old: Resource,
        /// The resource state after the change.
        new: Resource,
    },
    /// A resource was removed.
    Deleted(Resource),
}

impl RawEvent {
    /// The resource this notification is about (the new state for
    /// updates).
    #[must_use]
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Added(resource) | Self::Deleted(resource) => resource,
            Self::Updated { new, .. } => new,
        }
    }
}

/// Optional restrictions on which resources are published.
#[derive(Debug, Clone, Default)]
pub struct WatchFilter {
    namespace: Option<String>,
    name_pattern: Option<Regex>,
}

impl WatchFilter {
    /// A filter that passes everything.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Restrict to a single namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Restrict to resources whose name matches the pattern.
    #[must_use]
    pub fn with_name_pattern(mut self, pattern: Regex) -> Self {
        self.name_pattern = Some(pattern);
        self
    }

    /// The configured namespace restriction, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Whether the resource passes this filter.
    #[must_use]
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(ns) = &self.namespace {
            if resource.namespace() != ns {
                return false;
            }
        }
        if let Some(pattern) = &self.name_pattern {
            if !pattern.is_match(resource.name()) {
                return false;
            }
        }
        true
    }
}

/// Converts raw notifications into redacted change events and publishes
/// them under the resource's namespace.
///
/// Cluster-scoped resources (empty namespace) are dropped silently;
/// viewers only ever see namespaced state. Publication is non-blocking,
/// so a stalled subscriber never backs up into the watchers.
#[derive(Debug, Clone)]
pub struct WatchPipeline {
    broker: Broker,
    policy: Arc<RedactionPolicy>,
    filter: WatchFilter,
}

impl WatchPipeline {
    /// Create a pipeline publishing into the given broker.
    #[must_use]
    pub fn new(broker: Broker, policy: Arc<RedactionPolicy>) -> Self {
        Self {
            broker,
            policy,
            filter: WatchFilter::none(),
        }
    }

    /// Apply a resource filter to this pipeline.
    #[must_use]
    pub fn with_filter(mut self, filter: WatchFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The pipeline's filter.
    #[must_use]
    pub fn filter(&self) -> &WatchFilter {
        &self.filter
    }

    /// Normalize and publish one notification. Never blocks.
    pub fn handle(&self, raw: RawEvent) {
        let resource = raw.resource();
        let namespace = resource.namespace();
        if namespace.is_empty() {
            trace!(kind = resource.kind(), name = resource.name(), "dropping cluster-scoped resource");
            return;
        }
        if !self.filter.matches(resource) {
            return;
        }
        let namespace = namespace.to_string();

        let event = match raw {
            RawEvent::Added(resource) => ChangeEvent::added(self.policy.redact(resource)),
            RawEvent::Updated { new, .. } => ChangeEvent::updated(self.policy.redact(new)),
            RawEvent::Deleted(resource) => ChangeEvent::deleted(self.policy.redact(resource)),
        };

        let delivered = self.broker.publish(&namespace, &event);
        trace!(%namespace, kind = %event.kind, delivered, "change event published");
    }

    /// Consume a queue of raw notifications until all producers hang up.
    pub async fn run(self, mut rx: mpsc::Receiver<RawEvent>) {
        while let Some(raw) = rx.recv().await {
            self.handle(raw);
        }
        debug!("watch pipeline queue closed, stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use nsview_broker::{BrokerConfig, Scope, Subscription};
    use nsview_model::EventKind;
    use nsview_redact::REDACTED_SENTINEL;

    fn setup() -> (Broker, WatchPipeline) {
        let broker = Broker::new(BrokerConfig::new().with_channel_capacity(16));
        let pipeline = WatchPipeline::new(broker.clone(), Arc::new(RedactionPolicy::standard()));
        (broker, pipeline)
    }

    fn pod(namespace: &str, name: &str) -> Resource {
        Resource::new("v1", "Pod", namespace, name)
    }

    fn secret(namespace: &str, name: &str) -> Resource {
        Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": name, "namespace": namespace},
            "data": {"user": "dGVzdA==", "pass": "c2VjcmV0"},
        }))
    }

    fn recv_now(sub: &mut Subscription) -> ChangeEvent {
        sub.try_recv().expect("expected a delivered event")
    }

    #[tokio::test]
    async fn test_pod_added_reaches_subscriber() {
        let (broker, pipeline) = setup();
        let mut sub = broker.register(Scope::namespace("default"));

        pipeline.handle(RawEvent::Added(pod("default", "web-1")));

        let event = recv_now(&mut sub);
        assert_eq!(event.kind, EventKind::Added);
        assert_eq!(event.resource.unwrap().name(), "web-1");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_secret_is_redacted_in_flight() {
        let (broker, pipeline) = setup();
        let mut sub = broker.register(Scope::namespace("default"));

        pipeline.handle(RawEvent::Added(secret("default", "db-creds")));

        let event = recv_now(&mut sub);
        let value = event.resource.unwrap().into_value();
        let data = value["data"].as_object().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data["user"], REDACTED_SENTINEL);
        assert_eq!(data["pass"], REDACTED_SENTINEL);
    }

    #[tokio::test]
    async fn test_cluster_scoped_resource_dropped() {
        let (broker, pipeline) = setup();
        let mut sub = broker.register(Scope::All);

        pipeline.handle(RawEvent::Added(Resource::new("v1", "Namespace", "", "prod")));
        pipeline.handle(RawEvent::Deleted(Resource::new("v1", "Node", "", "worker-0")));

        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_other_namespace_not_delivered() {
        let (broker, pipeline) = setup();
        let mut default_sub = broker.register(Scope::namespace("default"));
        let mut system_sub = broker.register(Scope::namespace("kube-system"));

        pipeline.handle(RawEvent::Added(pod("default", "web-1")));

        assert!(default_sub.try_recv().is_some());
        assert!(system_sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_update_publishes_new_state() {
        let (broker, pipeline) = setup();
        let mut sub = broker.register(Scope::namespace("default"));

        let mut new = pod("default", "web-1");
        new.as_value_mut()["status"] = json!({"phase": "Running"});
        pipeline.handle(RawEvent::Updated {
            old: pod("default", "web-1"),
            new,
        });

        let event = recv_now(&mut sub);
        assert_eq!(event.kind, EventKind::Updated);
        assert_eq!(
            event.resource.unwrap().as_value()["status"]["phase"],
            "Running"
        );
    }

    #[tokio::test]
    async fn test_namespace_filter() {
        let (broker, pipeline) = setup();
        let pipeline = pipeline.with_filter(WatchFilter::none().with_namespace("default"));
        let mut sub = broker.register(Scope::All);

        pipeline.handle(RawEvent::Added(pod("other", "web-1")));
        assert!(sub.try_recv().is_none());

        pipeline.handle(RawEvent::Added(pod("default", "web-2")));
        assert_eq!(recv_now(&mut sub).resource.unwrap().name(), "web-2");
    }

    #[tokio::test]
    async fn test_name_pattern_filter() {
        let (broker, pipeline) = setup();
        let pattern = Regex::new("^web-").unwrap();
        let pipeline = pipeline.with_filter(WatchFilter::none().with_name_pattern(pattern));
        let mut sub = broker.register(Scope::namespace("default"));

        pipeline.handle(RawEvent::Added(pod("default", "db-0")));
        assert!(sub.try_recv().is_none());

        pipeline.handle(RawEvent::Added(pod("default", "web-1")));
        assert!(sub.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_run_consumes_queue_until_closed() {
        let (broker, pipeline) = setup();
        let mut sub = broker.register(Scope::namespace("default"));

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(pipeline.run(rx));

        tx.send(RawEvent::Added(pod("default", "web-1")))
            .await
            .unwrap();
        tx.send(RawEvent::Deleted(pod("default", "web-1")))
            .await
            .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(sub.recv().await.unwrap().kind, EventKind::Added);
        assert_eq!(sub.recv().await.unwrap().kind, EventKind::Deleted);
    }

    #[tokio::test]
    async fn test_deleted_secret_also_redacted() {
        let (broker, pipeline) = setup();
        let mut sub = broker.register(Scope::namespace("default"));

        pipeline.handle(RawEvent::Deleted(secret("default", "db-creds")));

        let event = recv_now(&mut sub);
        assert_eq!(event.kind, EventKind::Deleted);
        assert_eq!(
            event.resource.unwrap().as_value()["data"]["user"],
            REDACTED_SENTINEL
        );
    }
}
