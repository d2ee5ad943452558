//! Change events delivered to namespace subscribers.

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// The kind of change a [`ChangeEvent`] describes.
///
/// The serialized form doubles as the transport frame type tag, so the
/// wire labels follow the push-stream contract rather than the variant
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A resource appeared in the watched set.
    #[serde(rename = "add")]
    Added,
    /// A watched resource changed.
    #[serde(rename = "update")]
    Updated,
    /// A watched resource was removed.
    #[serde(rename = "delete")]
    Deleted,
    /// Periodic liveness signal, carries no resource.
    #[serde(rename = "ping")]
    Heartbeat,
}

impl EventKind {
    /// The lowercase transport label for this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Added => "add",
            Self::Updated => "update",
            Self::Deleted => "delete",
            Self::Heartbeat => "ping",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single normalized change event.
///
/// Non-heartbeat events always carry a resource with a non-empty
/// namespace; the watch pipeline never constructs events for
/// cluster-scoped resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened.
    #[serde(rename = "eventType")]
    pub kind: EventKind,
    /// The affected resource, absent for heartbeats.
    #[serde(rename = "object", skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

impl ChangeEvent {
    /// Event for a resource that appeared.
    #[must_use]
    pub fn added(resource: Resource) -> Self {
        Self {
            kind: EventKind::Added,
            resource: Some(resource),
        }
    }

    /// Event for a resource that changed.
    #[must_use]
    pub fn updated(resource: Resource) -> Self {
        Self {
            kind: EventKind::Updated,
            resource: Some(resource),
        }
    }

    /// Event for a resource that was removed.
    #[must_use]
    pub fn deleted(resource: Resource) -> Self {
        Self {
            kind: EventKind::Deleted,
            resource: Some(resource),
        }
    }

    /// Liveness event with no payload.
    #[must_use]
    pub const fn heartbeat() -> Self {
        Self {
            kind: EventKind::Heartbeat,
            resource: None,
        }
    }

    /// The namespace of the carried resource, empty for heartbeats.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.resource.as_ref().map_or("", Resource::namespace)
    }
}
