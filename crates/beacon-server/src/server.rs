//! `GatewayServer` — Axum HTTP + WebSocket gateway.
//!
//! The composition root constructs one registry, validator, and publisher
//! per server and injects them everywhere; their lifecycle is the server's
//! lifecycle. There is no implicit global.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::access::{AccessValidator, CallerIdentity, OwnershipStore};
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::publish::EventPublisher;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::ChannelRegistry;
use crate::websocket::session::run_ws_session;

/// Header carrying the authenticated caller identity. Authentication runs
/// upstream; a missing header maps to the single-tenant local user.
const CALLER_HEADER: &str = "x-beacon-caller";

/// Fallback identity for single-tenant deployments.
const LOCAL_CALLER: &str = "local";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Channel registry for subscription fan-out.
    pub registry: Arc<ChannelRegistry>,
    /// Subscription access validator.
    pub validator: Arc<AccessValidator>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: ServerConfig,
    /// When the gateway started.
    pub start_time: Instant,
    /// Prometheus render handle, when metrics are installed.
    pub metrics_handle: Option<PrometheusHandle>,
}

/// The Beacon gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    registry: Arc<ChannelRegistry>,
    validator: Arc<AccessValidator>,
    publisher: EventPublisher,
    shutdown: Arc<ShutdownCoordinator>,
    metrics_handle: Option<PrometheusHandle>,
    start_time: Instant,
}

impl GatewayServer {
    /// Create a new gateway over the given ownership store.
    pub fn new(config: ServerConfig, store: Arc<dyn OwnershipStore>) -> Self {
        let registry = Arc::new(ChannelRegistry::new());
        Self {
            config,
            validator: Arc::new(AccessValidator::new(store)),
            publisher: EventPublisher::new(registry.clone()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics_handle: None,
            start_time: Instant::now(),
            registry,
        }
    }

    /// Attach a Prometheus handle, enabling the `/metrics` route.
    #[must_use]
    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            validator: self.validator.clone(),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// The channel registry.
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// The event publisher producers hand events to.
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.connection_count();
    let channels = state.registry.active_channels().len();
    Json(health::health_check(state.start_time, connections, channels))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /ws — WebSocket upgrade.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if state.registry.connection_count() >= state.config.max_connections {
        warn!(
            max = state.config.max_connections,
            "refusing connection, at capacity"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let identity: CallerIdentity = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(LOCAL_CALLER)
        .into();

    let registry = state.registry.clone();
    let validator = state.validator.clone();
    let config = state.config.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, identity, registry, validator, config))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::InMemoryOwnershipStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_server() -> GatewayServer {
        GatewayServer::new(
            ServerConfig::default(),
            Arc::new(InMemoryOwnershipStore::new()),
        )
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
    }

    #[test]
    fn registry_starts_empty() {
        let server = make_server();
        assert_eq!(server.registry().connection_count(), 0);
        assert!(server.registry().active_channels().is_empty());
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
        server.shutdown().shutdown();
        assert!(server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn publisher_shares_the_server_registry() {
        let server = make_server();
        // A publish with no subscribers must be a silent no-op.
        server
            .publisher()
            .turn_completed(&beacon_core::SessionId::from("s1"));
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["active_channels"], 0);
    }

    #[tokio::test]
    async fn metrics_route_404_without_recorder() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_route_exists() {
        let server = make_server();
        let app = server.router();

        // Plain GET without upgrade headers is rejected by the extractor,
        // but the route itself must exist.
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_ne!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
