//! Cluster connectivity: dynamic client, watcher tasks, and the
//! namespace snapshot fetch.

use std::collections::HashMap;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DynamicObject, ListParams, LogParams};
use kube::runtime::watcher;
use kube::runtime::{WatchStreamExt, watcher::Event};
use kube::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nsview_model::Resource;
use nsview_redact::RedactionPolicy;

use crate::error::{WatchError, WatchResult};
use crate::kinds::WatchedKind;
use crate::pipeline::RawEvent;

/// Whether the process is running inside a cluster pod.
#[must_use]
pub fn in_cluster() -> bool {
    std::env::var_os("KUBERNETES_SERVICE_HOST").is_some()
}

/// Log lines fetched when the caller does not ask for a count.
pub const DEFAULT_LOG_TAIL_LINES: i64 = 100;

fn validate_log_target(namespace: &str, pod: &str) -> WatchResult<()> {
    if namespace.is_empty() {
        return Err(WatchError::InvalidNamespace(
            "namespace must not be empty".to_string(),
        ));
    }
    if pod.is_empty() {
        return Err(WatchError::InvalidPodName(
            "pod name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// An authenticated handle to the cluster, shared by the watchers and
/// the snapshot fetch.
///
/// All access goes through the dynamic API so every tracked kind uses
/// the same representation. Authentication, retry, and reconnection are
/// kube's concern; watchers simply resume receiving notifications after
/// a stream restart.
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    use_endpoint_slices: bool,
}

impl ClusterClient {
    /// Connect using the inferred configuration: in-cluster service
    /// account when present, local kubeconfig otherwise.
    pub async fn connect() -> WatchResult<Self> {
        let client = Client::try_default().await?;
        info!(in_cluster = in_cluster(), "connected to cluster");
        Ok(Self {
            client,
            use_endpoint_slices: false,
        })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            use_endpoint_slices: false,
        }
    }

    /// Track endpoint slices instead of legacy endpoints.
    #[must_use]
    pub const fn with_endpoint_slices(mut self, enabled: bool) -> Self {
        self.use_endpoint_slices = enabled;
        self
    }

    /// List the names of all namespaces in the cluster.
    pub async fn list_namespaces(&self) -> WatchResult<Vec<String>> {
        let api = self.api_for(&WatchedKind::NAMESPACES, None);
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|ns| ns.metadata.name.unwrap_or_default())
            .collect())
    }

    /// Whether the named namespace exists.
    pub async fn namespace_exists(&self, namespace: &str) -> WatchResult<bool> {
        if namespace.is_empty() {
            return Ok(false);
        }
        let api = self.api_for(&WatchedKind::NAMESPACES, None);
        Ok(api.get_opt(namespace).await?.is_some())
    }

    /// Fetch the current state of every tracked kind in one namespace,
    /// keyed by plural resource name, with redaction applied.
    ///
    /// A kind whose list call fails (API disabled, RBAC gap) is logged
    /// and returned empty rather than failing the whole snapshot.
    pub async fn fetch_namespace(
        &self,
        namespace: &str,
        policy: &RedactionPolicy,
    ) -> WatchResult<HashMap<String, Vec<Resource>>> {
        if namespace.is_empty() {
            return Err(WatchError::InvalidNamespace(
                "namespace must not be empty".to_string(),
            ));
        }

        let mut snapshot = HashMap::new();
        for kind in WatchedKind::snapshot_set(self.use_endpoint_slices) {
            let api = self.api_for(&kind, Some(namespace));
            let resources = match api.list(&ListParams::default()).await {
                Ok(list) => list
                    .items
                    .iter()
                    .filter_map(|obj| match to_resource(obj, &kind) {
                        Ok(resource) => Some(policy.redact(resource)),
                        Err(err) => {
                            warn!(kind = kind.kind, error = %err, "skipping unconvertible resource");
                            None
                        }
                    })
                    .collect(),
                Err(err) => {
                    warn!(kind = kind.kind, %namespace, error = %err, "snapshot list failed for kind");
                    Vec::new()
                }
            };
            snapshot.insert(kind.plural.to_string(), resources);
        }
        Ok(snapshot)
    }

    /// Fetch the tail of one pod's logs.
    ///
    /// A `tail_lines` of `None` or zero falls back to
    /// [`DEFAULT_LOG_TAIL_LINES`].
    pub async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        tail_lines: Option<i64>,
    ) -> WatchResult<String> {
        validate_log_target(namespace, pod)?;
        let lines = match tail_lines {
            Some(n) if n > 0 => n,
            _ => DEFAULT_LOG_TAIL_LINES,
        };

        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(lines),
            ..LogParams::default()
        };
        Ok(api.logs(pod, &params).await?)
    }

    /// Spawn one watcher task per tracked kind, all feeding the given
    /// raw-event queue.
    ///
    /// When `namespace` is set, watches are restricted server-side to
    /// that namespace. Tasks run for the process lifetime; they stop on
    /// their own once the queue's receiver is dropped.
    #[must_use]
    pub fn spawn_watchers(
        &self,
        namespace: Option<&str>,
        tx: &mpsc::Sender<RawEvent>,
    ) -> Vec<JoinHandle<()>> {
        WatchedKind::watch_set(self.use_endpoint_slices)
            .into_iter()
            .map(|kind| {
                // Namespace watches are always cluster-wide; the
                // pipeline drops their events anyway and the watch only
                // exists for membership tracking.
                let ns = if kind == WatchedKind::NAMESPACES {
                    None
                } else {
                    namespace
                };
                let api = self.api_for(&kind, ns);
                tokio::spawn(run_watcher(api, kind, tx.clone()))
            })
            .collect()
    }

    fn api_for(&self, kind: &WatchedKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = kind.api_resource();
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("use_endpoint_slices", &self.use_endpoint_slices)
            .finish_non_exhaustive()
    }
}

/// One watcher loop: converts the kube watch stream for a single kind
/// into raw events on the shared queue.
///
/// The stream restarts with backoff after transport errors; the cache
/// of last-seen objects distinguishes adds from updates the way an
/// informer's old/new callbacks would.
async fn run_watcher(api: Api<DynamicObject>, kind: WatchedKind, tx: mpsc::Sender<RawEvent>) {
    let mut last_seen: HashMap<String, Resource> = HashMap::new();
    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    debug!(kind = kind.kind, "watcher started");
    while let Some(item) = stream.next().await {
        let raw = match item {
            Ok(Event::Apply(obj) | Event::InitApply(obj)) => match to_resource(&obj, &kind) {
                Ok(resource) => {
                    let key = cache_key(&resource);
                    match last_seen.insert(key, resource.clone()) {
                        Some(old) => RawEvent::Updated { old, new: resource },
                        None => RawEvent::Added(resource),
                    }
                }
                Err(err) => {
                    warn!(kind = kind.kind, error = %err, "dropping unconvertible resource");
                    continue;
                }
            },
            Ok(Event::Delete(obj)) => match to_resource(&obj, &kind) {
                Ok(resource) => {
                    last_seen.remove(&cache_key(&resource));
                    RawEvent::Deleted(resource)
                }
                Err(err) => {
                    warn!(kind = kind.kind, error = %err, "dropping unconvertible resource");
                    continue;
                }
            },
            Ok(Event::Init | Event::InitDone) => continue,
            Err(err) => {
                warn!(kind = kind.kind, error = %err, "watch stream error, backing off");
                continue;
            }
        };

        if tx.send(raw).await.is_err() {
            // Pipeline is gone; the process is shutting down.
            break;
        }
    }
    debug!(kind = kind.kind, "watcher stopped");
}

fn cache_key(resource: &Resource) -> String {
    format!("{}/{}", resource.namespace(), resource.name())
}

/// Convert a dynamic object to the generic resource representation,
/// filling in `apiVersion`/`kind` when the watch response omits them.
fn to_resource(obj: &DynamicObject, kind: &WatchedKind) -> WatchResult<Resource> {
    let mut value = serde_json::to_value(obj)?;
    if let Some(map) = value.as_object_mut() {
        map.entry("apiVersion")
            .or_insert_with(|| serde_json::Value::String(kind.api_version()));
        map.entry("kind")
            .or_insert_with(|| serde_json::Value::String(kind.kind.to_string()));
    }
    Ok(Resource::from_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use kube::core::ApiResource;

    #[test]
    fn test_in_cluster_matches_environment() {
        // Mutating process env is unsafe in edition 2024; assert against
        // whatever the test environment provides instead.
        let expected = std::env::var_os("KUBERNETES_SERVICE_HOST").is_some();
        assert_eq!(in_cluster(), expected);
    }

    #[test]
    fn test_log_target_rejects_empty_namespace() {
        let err = validate_log_target("", "web-1").unwrap_err();
        assert!(matches!(err, WatchError::InvalidNamespace(_)));
    }

    #[test]
    fn test_log_target_rejects_empty_pod_name() {
        let err = validate_log_target("default", "").unwrap_err();
        assert!(matches!(err, WatchError::InvalidPodName(_)));
    }

    #[test]
    fn test_log_target_accepts_valid_pair() {
        assert!(validate_log_target("default", "web-1").is_ok());
    }

    #[test]
    fn test_to_resource_injects_missing_type_meta() {
        let obj = DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("web-1".to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            data: serde_json::json!({}),
        };

        let resource = to_resource(&obj, &WatchedKind::PODS).unwrap();
        assert_eq!(resource.kind(), "Pod");
        assert_eq!(resource.api_version(), "v1");
        assert_eq!(resource.name(), "web-1");
        assert_eq!(resource.namespace(), "default");
    }

    #[test]
    fn test_to_resource_keeps_existing_type_meta() {
        let ar: ApiResource = WatchedKind::DEPLOYMENTS.api_resource();
        let obj = DynamicObject::new("api", &ar).within("default");

        let resource = to_resource(&obj, &WatchedKind::DEPLOYMENTS).unwrap();
        assert_eq!(resource.api_version(), "apps/v1");
        assert_eq!(resource.kind(), "Deployment");
    }

    #[test]
    fn test_cache_key_includes_namespace() {
        let a = Resource::new("v1", "Pod", "default", "web");
        let b = Resource::new("v1", "Pod", "kube-system", "web");

        assert_ne!(cache_key(&a), cache_key(&b));
    }
}
