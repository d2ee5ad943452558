//! # nsview-server
//!
//! HTTP API and push-stream boundary for nsview. Viewers subscribe to a
//! namespace over SSE and receive every change event the watch pipeline
//! publishes for it, plus periodic pings; a synchronous snapshot fetch
//! covers the state that existed before the stream opened.
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/health` | GET | Liveness and uptime |
//! | `/api/namespaces` | GET | Names of all namespaces |
//! | `/api/fetch/{namespace}` | GET | Snapshot of all tracked kinds |
//! | `/api/logs/{namespace}/{pod}` | GET | Tail of one pod's logs |
//! | `/api/updates` | GET | SSE stream of change events |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ViewerError, ViewerResult};
pub use server::ViewerServer;
pub use state::{AppState, ClusterView};
