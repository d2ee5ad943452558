//! Viewer server configuration.

use std::net::SocketAddr;

/// Default maximum concurrent SSE connections.
pub const DEFAULT_MAX_SSE_CONNECTIONS: usize = 1000;

/// Configuration for the viewer API server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Restrict the whole server to a single namespace.
    pub namespace: Option<String>,
    /// Maximum concurrent SSE connections allowed.
    pub max_sse_connections: usize,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            namespace: None,
            max_sse_connections: DEFAULT_MAX_SSE_CONNECTIONS,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Serve only the given namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the maximum concurrent SSE connections.
    #[must_use]
    pub const fn with_max_sse_connections(mut self, max: usize) -> Self {
        self.max_sse_connections = max;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.namespace.is_none());
        assert_eq!(config.max_sse_connections, DEFAULT_MAX_SSE_CONNECTIONS);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000);
        let config = ServerConfig::new(addr)
            .with_namespace("default")
            .with_max_sse_connections(10)
            .with_cors_origin("http://localhost:3000");

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.namespace.as_deref(), Some("default"));
        assert_eq!(config.max_sse_connections, 10);
        assert_eq!(config.cors_origins.len(), 1);
    }
}
