//! # nsview-broker
//!
//! In-memory publish/subscribe registry keyed by namespace. Watchers
//! publish normalized change events; each connected viewer holds a
//! [`Subscription`] whose bounded channel the broker delivers into.
//! A background heartbeat task periodically pings every subscriber so
//! transports can detect dead connections.
//!
//! Delivery is fire-and-forget per subscriber: a stalled consumer never
//! blocks the publishing watcher or any other subscriber. When a
//! subscriber's channel is full the event is dropped for that
//! subscriber only (drop-newest).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
pub mod config;
pub mod subscription;

pub use broker::{Broker, Scope};
pub use config::BrokerConfig;
pub use subscription::{Subscription, SubscriptionId};
