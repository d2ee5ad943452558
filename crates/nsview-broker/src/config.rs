//! Broker configuration.

use std::time::Duration;

/// Default per-subscriber delivery channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for the event broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Bounded capacity of each subscriber's delivery channel.
    /// When full, further events are dropped for that subscriber.
    pub channel_capacity: usize,
    /// Interval between heartbeat events sent to every subscriber.
    pub heartbeat_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl BrokerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-subscriber channel capacity.
    ///
    /// A capacity of zero is clamped to one; tokio channels require a
    /// positive bound.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
