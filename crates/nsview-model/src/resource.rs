//! Generic representation of a watched Kubernetes resource.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A single Kubernetes resource of any kind.
///
/// Resources are kept as the raw labeled tree the cluster returned
/// (`apiVersion`, `kind`, `metadata`, plus kind-specific fields) instead
/// of per-kind structs, so one watch pipeline serves every kind.
/// Typed accessors cover the fields the pipeline actually routes on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Value);

impl Resource {
    /// Wrap a raw JSON value as a resource.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Build a minimal resource with the given identity fields.
    ///
    /// The namespace is omitted from the metadata when empty, matching
    /// how the API server represents cluster-scoped objects.
    #[must_use]
    pub fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::String(name.to_string()));
        if !namespace.is_empty() {
            metadata.insert(
                "namespace".to_string(),
                Value::String(namespace.to_string()),
            );
        }
        Self(json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": metadata,
        }))
    }

    /// The resource `kind`, or an empty string when absent.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.0.get("kind").and_then(Value::as_str).unwrap_or("")
    }

    /// The resource `apiVersion`, or an empty string when absent.
    #[must_use]
    pub fn api_version(&self) -> &str {
        self.0
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// The `metadata.name`, or an empty string when absent.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata_str("name")
    }

    /// The `metadata.namespace`, or an empty string for cluster-scoped
    /// resources.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace")
    }

    /// The `metadata.uid`, or an empty string when absent.
    #[must_use]
    pub fn uid(&self) -> &str {
        self.metadata_str("uid")
    }

    /// Borrow the underlying JSON tree.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Mutably borrow the underlying JSON tree.
    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Unwrap into the underlying JSON tree.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    fn metadata_str(&self, field: &str) -> &str {
        self.0
            .get("metadata")
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

impl From<Value> for Resource {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
