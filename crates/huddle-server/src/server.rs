//! `HuddleServer`: Axum router, listener and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use huddle_auth::Authenticator;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::hub::Hub;
use crate::session::ws_handler;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the hub control loop.
    pub hub: Hub,
    /// Credential validation.
    pub authenticator: Arc<dyn Authenticator>,
    /// Per-session settings.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct HuddleServer {
    config: Arc<ServerConfig>,
    hub: Hub,
    hub_task: JoinHandle<()>,
    authenticator: Arc<dyn Authenticator>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl HuddleServer {
    /// Create a server and start its hub. Must be called inside a Tokio
    /// runtime.
    pub fn new(config: ServerConfig, authenticator: Arc<dyn Authenticator>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, hub_task) = Hub::spawn(config.hub_queue_capacity, shutdown.token());
        Self {
            config: Arc::new(config),
            hub,
            hub_task,
            authenticator,
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            authenticator: self.authenticator.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Handle to the hub.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Bind and start serving. The listener stops when the shutdown token is
    /// cancelled.
    pub async fn listen(self) -> std::io::Result<ServerHandle> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "huddle server listening");

        let token = self.shutdown.token();
        let server_task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "server exited with error");
            }
        });

        Ok(ServerHandle {
            addr,
            hub: self.hub,
            shutdown: self.shutdown,
            timeout: self.config.shutdown_timeout,
            tasks: vec![server_task, self.hub_task],
        })
    }
}

/// A running server.
pub struct ServerHandle {
    addr: SocketAddr,
    hub: Hub,
    shutdown: Arc<ShutdownCoordinator>,
    timeout: std::time::Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handle to the hub.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Stop accepting connections, stop the hub and wait for both.
    pub async fn stop(self) {
        self.shutdown.stop(self.tasks, self.timeout).await;
        info!("huddle server stopped");
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.hub.snapshot().await.unwrap_or_default();
    Json(health::health_check(state.start_time, &snapshot))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
