//! HTTP request handlers for the viewer API.

use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use nsview_broker::Subscription;
use nsview_model::{ChangeEvent, Resource};

use crate::error::{ViewerError, ViewerResult};
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Query parameters for the updates stream.
#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    /// Namespace to stream; omitted means all namespaces.
    pub namespace: Option<String>,
    /// Opaque client identifier, used only for request correlation.
    #[serde(rename = "clientID")]
    pub client_id: Option<String>,
}

/// Query parameters for the pod-logs endpoint.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Trailing lines to return; the server default applies when
    /// omitted.
    pub lines: Option<i64>,
}

/// Pod log response body.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    /// The log tail, newline-separated.
    pub logs: String,
}

/// In single-namespace mode, reject requests for any other namespace.
fn ensure_served_namespace(state: &AppState, namespace: &str) -> ViewerResult<()> {
    if let Some(served) = &state.config().namespace {
        if served != namespace {
            return Err(ViewerError::InvalidRequest(format!(
                "server is restricted to namespace {served}"
            )));
        }
    }
    Ok(())
}

/// Handle GET /api/health - health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle GET /api/namespaces - list namespace names.
///
/// In single-namespace mode only the configured namespace is returned,
/// without a cluster round trip.
pub async fn list_namespaces(State(state): State<AppState>) -> ViewerResult<Json<Vec<String>>> {
    if let Some(ns) = &state.config().namespace {
        return Ok(Json(vec![ns.clone()]));
    }
    let namespaces = state.cluster().list_namespaces().await?;
    Ok(Json(namespaces))
}

/// Handle GET `/api/fetch/{namespace}` - snapshot of all tracked kinds.
pub async fn fetch_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ViewerResult<Json<HashMap<String, Vec<Resource>>>> {
    ensure_served_namespace(&state, &namespace)?;
    if !state.cluster().namespace_exists(&namespace).await? {
        return Err(ViewerError::NotFound("namespace".to_string(), namespace));
    }

    let snapshot = state
        .cluster()
        .fetch_namespace(&namespace, state.policy())
        .await?;
    Ok(Json(snapshot))
}

/// Handle GET `/api/logs/{namespace}/{pod}` - tail of one pod's logs.
pub async fn get_pod_logs(
    State(state): State<AppState>,
    Path((namespace, pod)): Path<(String, String)>,
    Query(query): Query<LogQuery>,
) -> ViewerResult<Json<LogsResponse>> {
    ensure_served_namespace(&state, &namespace)?;
    let logs = state
        .cluster()
        .pod_logs(&namespace, &pod, query.lines)
        .await?;
    Ok(Json(LogsResponse { logs }))
}

/// Handle GET /api/updates - SSE stream of change events.
///
/// The subscription is registered before this handler returns, so a
/// snapshot fetched immediately afterwards cannot miss a change that
/// happens in between. Teardown is driven by the transport: when the
/// client goes away axum drops the stream, which unregisters the
/// subscription and releases the connection slot.
pub async fn stream_updates(
    State(state): State<AppState>,
    Query(query): Query<UpdateQuery>,
) -> ViewerResult<Sse<KeepAliveStream<UpdateStream>>> {
    if let Some(requested) = &query.namespace {
        ensure_served_namespace(&state, requested)?;
    }
    if !state.add_sse_connection() {
        return Err(ViewerError::TooManyConnections(
            state.sse_connection_count(),
            state.config().max_sse_connections,
        ));
    }

    let namespace = query
        .namespace
        .as_deref()
        .or(state.config().namespace.as_deref());
    let subscription = state.subscribe(namespace);

    info!(
        namespace = namespace.unwrap_or("*"),
        client_id = query.client_id.as_deref().unwrap_or("-"),
        subscription = %subscription.id(),
        "viewer stream opened"
    );

    let stream = UpdateStream {
        subscription,
        client_id: query.client_id,
        state,
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// The per-viewer push stream: relays delivered events to the SSE
/// transport until either side hangs up.
pub struct UpdateStream {
    subscription: Subscription,
    client_id: Option<String>,
    state: AppState,
}

impl Stream for UpdateStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.subscription).poll_next(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(Ok(sse_frame(&event)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for UpdateStream {
    fn drop(&mut self) {
        self.state.remove_sse_connection();
        debug!(
            client_id = self.client_id.as_deref().unwrap_or("-"),
            subscription = %self.subscription.id(),
            "viewer stream closed"
        );
    }
}

/// Encode a change event as a transport frame: the event kind's
/// lowercase label as the type tag, the serialized resource as payload
/// (empty for pings).
fn sse_frame(event: &ChangeEvent) -> Event {
    let frame = Event::default().event(event.kind.label());
    match &event.resource {
        Some(resource) => match serde_json::to_string(resource) {
            Ok(payload) => frame.data(payload),
            // A resource that cannot serialize degrades to an empty
            // payload instead of killing the stream.
            Err(_) => frame.data(""),
        },
        None => frame.data(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::state::testing::{make_test_state, make_test_state_with};
    use futures::StreamExt;

    use nsview_model::EventKind;

    #[tokio::test]
    async fn test_health_check() {
        let state = make_test_state();
        let response = health_check(State(state)).await;

        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn test_list_namespaces() {
        let state = make_test_state();
        let Json(namespaces) = list_namespaces(State(state)).await.unwrap();

        assert_eq!(namespaces, vec!["default", "kube-system"]);
    }

    #[tokio::test]
    async fn test_list_namespaces_single_namespace_mode() {
        let state = make_test_state_with(ServerConfig::default().with_namespace("default"));
        let Json(namespaces) = list_namespaces(State(state)).await.unwrap();

        assert_eq!(namespaces, vec!["default"]);
    }

    #[tokio::test]
    async fn test_fetch_unknown_namespace() {
        let state = make_test_state();
        let result = fetch_namespace(State(state), Path("missing".to_string())).await;

        assert!(matches!(result, Err(ViewerError::NotFound(_, _))));
    }

    #[tokio::test]
    async fn test_fetch_outside_restricted_namespace() {
        let state = make_test_state_with(ServerConfig::default().with_namespace("default"));
        let result = fetch_namespace(State(state), Path("kube-system".to_string())).await;

        assert!(matches!(result, Err(ViewerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_pod_logs_returns_tail() {
        let state = make_test_state();
        let Json(body) = get_pod_logs(
            State(state),
            Path(("default".to_string(), "web-1".to_string())),
            Query(LogQuery { lines: None }),
        )
        .await
        .unwrap();

        assert_eq!(body.logs, "line-1\nline-2");
    }

    #[tokio::test]
    async fn test_pod_logs_unknown_pod() {
        let state = make_test_state();
        let result = get_pod_logs(
            State(state),
            Path(("default".to_string(), "missing".to_string())),
            Query(LogQuery { lines: Some(50) }),
        )
        .await;

        assert!(matches!(result, Err(ViewerError::NotFound(_, _))));
    }

    #[tokio::test]
    async fn test_pod_logs_outside_restricted_namespace() {
        let state = make_test_state_with(ServerConfig::default().with_namespace("default"));
        let result = get_pod_logs(
            State(state),
            Path(("kube-system".to_string(), "dns-0".to_string())),
            Query(LogQuery { lines: None }),
        )
        .await;

        assert!(matches!(result, Err(ViewerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_stream_outside_restricted_namespace() {
        let state = make_test_state_with(ServerConfig::default().with_namespace("default"));

        let result = stream_updates(
            State(state.clone()),
            Query(UpdateQuery {
                namespace: Some("kube-system".to_string()),
                client_id: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(ViewerError::InvalidRequest(_))));
        // Rejected before any slot or subscription was taken.
        assert_eq!(state.sse_connection_count(), 0);
        assert_eq!(state.broker().total_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_stream_registers_and_releases() {
        let state = make_test_state();

        let sse = stream_updates(
            State(state.clone()),
            Query(UpdateQuery {
                namespace: Some("default".to_string()),
                client_id: Some("viewer-1".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(state.sse_connection_count(), 1);
        assert_eq!(state.broker().total_subscribers(), 1);

        drop(sse);
        assert_eq!(state.sse_connection_count(), 0);
        assert_eq!(state.broker().total_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_stream_connection_limit() {
        let state = make_test_state_with(ServerConfig::default().with_max_sse_connections(1));

        let first = stream_updates(
            State(state.clone()),
            Query(UpdateQuery {
                namespace: None,
                client_id: None,
            }),
        )
        .await;
        assert!(first.is_ok());

        let second = stream_updates(
            State(state.clone()),
            Query(UpdateQuery {
                namespace: None,
                client_id: None,
            }),
        )
        .await;
        assert!(matches!(
            second,
            Err(ViewerError::TooManyConnections(_, _))
        ));
    }

    #[tokio::test]
    async fn test_update_stream_relays_events() {
        let state = make_test_state();
        let subscription = state.subscribe(Some("default"));
        state.add_sse_connection();

        let mut stream = UpdateStream {
            subscription,
            client_id: None,
            state: state.clone(),
        };

        state.broker().publish(
            "default",
            &ChangeEvent::added(Resource::new("v1", "Pod", "default", "web-1")),
        );

        let frame = stream.next().await.unwrap().unwrap();
        // Event has no public accessors; the relay path is covered by
        // asserting the stream yields exactly one frame per publish.
        drop(frame);
        assert!(futures::poll!(stream.next()).is_pending());
    }

    #[tokio::test]
    async fn test_stream_defaults_to_configured_namespace() {
        let state = make_test_state_with(ServerConfig::default().with_namespace("default"));

        let _sse = stream_updates(
            State(state.clone()),
            Query(UpdateQuery {
                namespace: None,
                client_id: None,
            }),
        )
        .await
        .unwrap();

        // Registered under the configured namespace, not all-scope.
        assert_eq!(
            state
                .broker()
                .subscriber_count(&nsview_broker::Scope::namespace("default")),
            1
        );
    }

    #[test]
    fn test_sse_frame_kinds() {
        let add = ChangeEvent::added(Resource::new("v1", "Pod", "default", "web-1"));
        let ping = ChangeEvent::heartbeat();

        // Frames build without panicking for both payload shapes.
        let _ = sse_frame(&add);
        let _ = sse_frame(&ping);
        assert_eq!(add.kind, EventKind::Added);
        assert_eq!(ping.kind, EventKind::Heartbeat);
    }
}
