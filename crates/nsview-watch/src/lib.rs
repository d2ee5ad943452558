//! # nsview-watch
//!
//! The cluster-watch side of nsview: one watcher task per resource
//! kind converts raw cluster notifications into a uniform event queue,
//! and the [`WatchPipeline`] normalizes, redacts, and publishes them to
//! the broker under the resource's namespace.
//!
//! The watchers use kube's dynamic API so every kind flows through the
//! same code path; no per-kind schema exists anywhere in the pipeline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod error;
pub mod kinds;
pub mod pipeline;

pub use cluster::{ClusterClient, DEFAULT_LOG_TAIL_LINES, in_cluster};
pub use error::{WatchError, WatchResult};
pub use kinds::WatchedKind;
pub use pipeline::{RawEvent, WatchFilter, WatchPipeline};
