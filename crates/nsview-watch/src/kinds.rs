//! The table of resource kinds nsview tracks.

use kube::core::{ApiResource, GroupVersionKind};

/// One watched resource kind: its API group coordinates plus the plural
/// name used as the snapshot map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchedKind {
    /// API group, empty for the core group.
    pub group: &'static str,
    /// API version within the group.
    pub version: &'static str,
    /// CamelCase kind name as it appears on resources.
    pub kind: &'static str,
    /// Lowercase plural resource name.
    pub plural: &'static str,
}

impl WatchedKind {
    /// Pods (core/v1).
    pub const PODS: Self = Self::core("Pod", "pods");
    /// Services (core/v1).
    pub const SERVICES: Self = Self::core("Service", "services");
    /// Endpoints (core/v1), the legacy endpoint representation.
    pub const ENDPOINTS: Self = Self::core("Endpoints", "endpoints");
    /// ConfigMaps (core/v1).
    pub const CONFIG_MAPS: Self = Self::core("ConfigMap", "configmaps");
    /// Secrets (core/v1).
    pub const SECRETS: Self = Self::core("Secret", "secrets");
    /// PersistentVolumeClaims (core/v1).
    pub const PERSISTENT_VOLUME_CLAIMS: Self =
        Self::core("PersistentVolumeClaim", "persistentvolumeclaims");
    /// Events (core/v1).
    pub const EVENTS: Self = Self::core("Event", "events");
    /// Namespaces (core/v1), watched for membership tracking only.
    pub const NAMESPACES: Self = Self::core("Namespace", "namespaces");

    /// Deployments (apps/v1).
    pub const DEPLOYMENTS: Self = Self::apps("Deployment", "deployments");
    /// ReplicaSets (apps/v1).
    pub const REPLICA_SETS: Self = Self::apps("ReplicaSet", "replicasets");
    /// StatefulSets (apps/v1).
    pub const STATEFUL_SETS: Self = Self::apps("StatefulSet", "statefulsets");
    /// DaemonSets (apps/v1).
    pub const DAEMON_SETS: Self = Self::apps("DaemonSet", "daemonsets");

    /// Jobs (batch/v1).
    pub const JOBS: Self = Self::new("batch", "v1", "Job", "jobs");
    /// CronJobs (batch/v1).
    pub const CRON_JOBS: Self = Self::new("batch", "v1", "CronJob", "cronjobs");

    /// Ingresses (networking.k8s.io/v1).
    pub const INGRESSES: Self = Self::new("networking.k8s.io", "v1", "Ingress", "ingresses");
    /// HorizontalPodAutoscalers (autoscaling/v2).
    pub const HORIZONTAL_POD_AUTOSCALERS: Self = Self::new(
        "autoscaling",
        "v2",
        "HorizontalPodAutoscaler",
        "horizontalpodautoscalers",
    );
    /// EndpointSlices (discovery.k8s.io/v1), the modern endpoint
    /// representation.
    pub const ENDPOINT_SLICES: Self =
        Self::new("discovery.k8s.io", "v1", "EndpointSlice", "endpointslices");

    const fn new(
        group: &'static str,
        version: &'static str,
        kind: &'static str,
        plural: &'static str,
    ) -> Self {
        Self {
            group,
            version,
            kind,
            plural,
        }
    }

    const fn core(kind: &'static str, plural: &'static str) -> Self {
        Self::new("", "v1", kind, plural)
    }

    const fn apps(kind: &'static str, plural: &'static str) -> Self {
        Self::new("apps", "v1", kind, plural)
    }

    /// The kinds a watcher task is spawned for, including namespaces.
    ///
    /// Exactly one of endpoints and endpoint slices is tracked,
    /// selected by `use_endpoint_slices`.
    #[must_use]
    pub fn watch_set(use_endpoint_slices: bool) -> Vec<Self> {
        vec![
            Self::PODS,
            Self::SERVICES,
            if use_endpoint_slices {
                Self::ENDPOINT_SLICES
            } else {
                Self::ENDPOINTS
            },
            Self::CONFIG_MAPS,
            Self::SECRETS,
            Self::PERSISTENT_VOLUME_CLAIMS,
            Self::DEPLOYMENTS,
            Self::REPLICA_SETS,
            Self::STATEFUL_SETS,
            Self::DAEMON_SETS,
            Self::JOBS,
            Self::CRON_JOBS,
            Self::INGRESSES,
            Self::HORIZONTAL_POD_AUTOSCALERS,
            Self::EVENTS,
            Self::NAMESPACES,
        ]
    }

    /// The namespaced kinds included in a namespace snapshot fetch.
    #[must_use]
    pub fn snapshot_set(use_endpoint_slices: bool) -> Vec<Self> {
        Self::watch_set(use_endpoint_slices)
            .into_iter()
            .filter(|kind| *kind != Self::NAMESPACES)
            .collect()
    }

    /// The `apiVersion` string for resources of this kind.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The kube dynamic-API descriptor for this kind.
    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(self.group, self.version, self.kind),
            self.plural,
        )
    }
}
