//! Shared state for the viewer server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;

use nsview_broker::{Broker, Scope, Subscription};
use nsview_model::Resource;
use nsview_redact::RedactionPolicy;
use nsview_watch::ClusterClient;

use crate::config::ServerConfig;
use crate::error::ViewerResult;

/// Read-only cluster operations the HTTP layer needs.
///
/// The watch/broker core never calls these; they back the snapshot and
/// namespace-listing endpoints. A fake implementation stands in for the
/// cluster in router tests.
#[async_trait]
pub trait ClusterView: Send + Sync {
    /// Names of all namespaces in the cluster.
    async fn list_namespaces(&self) -> ViewerResult<Vec<String>>;

    /// Whether the named namespace exists.
    async fn namespace_exists(&self, namespace: &str) -> ViewerResult<bool>;

    /// Current state of every tracked kind in the namespace, keyed by
    /// plural resource name, redacted.
    async fn fetch_namespace(
        &self,
        namespace: &str,
        policy: &RedactionPolicy,
    ) -> ViewerResult<HashMap<String, Vec<Resource>>>;

    /// The tail of one pod's logs.
    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        tail_lines: Option<i64>,
    ) -> ViewerResult<String>;
}

#[async_trait]
impl ClusterView for ClusterClient {
    async fn list_namespaces(&self) -> ViewerResult<Vec<String>> {
        Ok(ClusterClient::list_namespaces(self).await?)
    }

    async fn namespace_exists(&self, namespace: &str) -> ViewerResult<bool> {
        Ok(ClusterClient::namespace_exists(self, namespace).await?)
    }

    async fn fetch_namespace(
        &self,
        namespace: &str,
        policy: &RedactionPolicy,
    ) -> ViewerResult<HashMap<String, Vec<Resource>>> {
        Ok(ClusterClient::fetch_namespace(self, namespace, policy).await?)
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        tail_lines: Option<i64>,
    ) -> ViewerResult<String> {
        Ok(ClusterClient::pod_logs(self, namespace, pod, tail_lines).await?)
    }
}

/// Shared state behind every request handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    broker: Broker,
    cluster: Arc<dyn ClusterView>,
    policy: Arc<RedactionPolicy>,
    sse_connections: Arc<AtomicUsize>,
    start_time: Instant,
}

impl AppState {
    /// Create the server state.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        broker: Broker,
        cluster: Arc<dyn ClusterView>,
        policy: Arc<RedactionPolicy>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            broker,
            cluster,
            policy,
            sse_connections: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The event broker.
    #[must_use]
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// The cluster handle.
    #[must_use]
    pub fn cluster(&self) -> &Arc<dyn ClusterView> {
        &self.cluster
    }

    /// The redaction policy applied to snapshots.
    #[must_use]
    pub fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    /// Register a subscription for a viewer.
    ///
    /// An omitted namespace subscribes to every namespace (all-scope),
    /// for cluster-wide viewers.
    #[must_use]
    pub fn subscribe(&self, namespace: Option<&str>) -> Subscription {
        let scope = match namespace {
            Some(ns) => Scope::namespace(ns),
            None => Scope::All,
        };
        self.broker.register(scope)
    }

    /// Number of active SSE connections.
    #[must_use]
    pub fn sse_connection_count(&self) -> usize {
        self.sse_connections.load(Ordering::Relaxed)
    }

    /// Reserve an SSE connection slot.
    ///
    /// Returns `true` if the connection is allowed, `false` when the
    /// limit is reached.
    pub fn add_sse_connection(&self) -> bool {
        let current = self.sse_connections.fetch_add(1, Ordering::Relaxed);
        if current >= self.config.max_sse_connections {
            self.sse_connections.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Release an SSE connection slot.
    pub fn remove_sse_connection(&self) {
        self.sse_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Server uptime in seconds.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("sse_connections", &self.sse_connection_count())
            .finish_non_exhaustive()
    }
}
