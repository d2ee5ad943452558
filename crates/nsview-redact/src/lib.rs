//! # nsview-redact
//!
//! Scrubs sensitive field values from resources before they leave the
//! process. Redaction replaces values with a fixed sentinel while
//! preserving the key set, so viewers can still enumerate secret key
//! names without ever seeing plaintext.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use nsview_model::Resource;

/// The value every redacted field is replaced with.
pub const REDACTED_SENTINEL: &str = "*REDACTED*";

/// A dot-separated path into a resource tree, with `*` matching every
/// key at that level. `data.*` covers all entries of a `data` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse a dot-separated path such as `data.*` or `stringData.*`.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self(path.split('.').map(str::to_string).collect())
    }

    fn segments(&self) -> &[String] {
        &self.0
    }
}

/// Static mapping from resource kind to the field paths that must be
/// scrubbed before delivery.
#[derive(Debug, Clone, Default)]
pub struct RedactionPolicy {
    paths_by_kind: HashMap<String, Vec<FieldPath>>,
}

impl RedactionPolicy {
    /// Policy with no covered kinds.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard policy: every `Secret.data` and `Secret.stringData`
    /// value is replaced with the sentinel.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty().with_kind("Secret", &["data.*", "stringData.*"])
    }

    /// Add field paths to scrub for a resource kind.
    #[must_use]
    pub fn with_kind(mut self, kind: &str, paths: &[&str]) -> Self {
        let entry = self.paths_by_kind.entry(kind.to_string()).or_default();
        entry.extend(paths.iter().map(|p| FieldPath::parse(p)));
        self
    }

    /// Whether any path is configured for the given kind.
    #[must_use]
    pub fn covers(&self, kind: &str) -> bool {
        self.paths_by_kind.contains_key(kind)
    }

    /// Scrub the configured field paths of the resource.
    ///
    /// Resources of kinds with no configured paths pass through
    /// unchanged. Paths that do not resolve in a particular resource
    /// are skipped rather than failing the event.
    #[must_use]
    pub fn redact(&self, mut resource: Resource) -> Resource {
        let Some(paths) = self.paths_by_kind.get(resource.kind()) else {
            return resource;
        };
        for path in paths {
            redact_path(resource.as_value_mut(), path.segments());
        }
        resource
    }
}

/// Replace the values addressed by `segments` under `value` with the
/// sentinel. Key names and the structural shape are preserved.
fn redact_path(value: &mut Value, segments: &[String]) {
    let Some((segment, rest)) = segments.split_first() else {
        *value = Value::String(REDACTED_SENTINEL.to_string());
        return;
    };

    let Some(map) = value.as_object_mut() else {
        trace!(segment, "redaction path does not resolve to an object, skipping");
        return;
    };

    if segment == "*" {
        for child in map.values_mut() {
            redact_path(child, rest);
        }
    } else if let Some(child) = map.get_mut(segment) {
        redact_path(child, rest);
    }
}
