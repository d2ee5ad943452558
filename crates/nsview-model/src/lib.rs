//! # nsview-model
//!
//! Shared data model for the nsview event-distribution pipeline.
//!
//! Every watched Kubernetes resource is carried as a [`Resource`], a
//! generic labeled tree with typed accessors rather than one fixed type
//! per kind. Resource mutations flow through the system as
//! [`ChangeEvent`] values tagged with an [`EventKind`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod event;
pub mod resource;

pub use event::{ChangeEvent, EventKind};
pub use resource::Resource;
