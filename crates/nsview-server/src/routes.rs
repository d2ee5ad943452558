//! Route configuration for the viewer API.

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    fetch_namespace, get_pod_logs, health_check, list_namespaces, stream_updates,
};
use crate::state::AppState;

/// Create the viewer API router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(state.config());

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/namespaces", get(list_namespaces))
        .route("/fetch/{namespace}", get(fetch_namespace))
        .route("/logs/{namespace}/{pod}", get(get_pod_logs))
        .route("/updates", get(stream_updates));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &crate::config::ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::state::testing::make_test_state;

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_namespaces_endpoint() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/api/namespaces")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, vec!["default", "kube-system"]);
    }

    #[tokio::test]
    async fn test_fetch_endpoint() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/api/fetch/default")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("pods").is_some());
    }

    #[tokio::test]
    async fn test_fetch_unknown_namespace_is_404() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/api/fetch/missing")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logs_endpoint() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/api/logs/default/web-1?lines=2")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["logs"], "line-1\nline-2");
    }

    #[tokio::test]
    async fn test_updates_endpoint_is_event_stream() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/api/updates?namespace=default&clientID=viewer-1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/api/unknown")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
