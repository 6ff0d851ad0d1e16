//! Health check endpoints and Prometheus metrics server
//!
//! This module provides HTTP endpoints for health checks, swarm statistics
//! and Prometheus metrics for the room-swarm bot fleet using Axum.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "room-swarm";

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub app_state: Option<Arc<AppState>>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    /// Set the application state for health checks
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Start the health server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Router exposing the probes, the Prometheus registry and the swarm views
    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .route("/rooms/{name}", get(room_handler))
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }

        Ok(())
    }
}

/// Body returned whenever the swarm state is not available
fn unavailable(error: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "status": HealthStatus::Unhealthy,
            "error": error,
            "timestamp": chrono::Utc::now()
        })),
    )
}

/// Degraded still serves traffic; only unhealthy fails the probe
fn probe_code(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/ready", "/alive", "/metrics", "/stats", "/rooms/{name}"]
    }))
}

/// Full component check of the coordinator and its sessions
async fn health_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Health check requested");

    let app_state = match &state.app_state {
        Some(app_state) => app_state.clone(),
        None => return unavailable("Service not initialized").into_response(),
    };

    match HealthCheck::check(app_state).await {
        Ok(health) => (probe_code(&health.status), Json(health)).into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            unavailable("Health check failed").into_response()
        }
    }
}

async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::readiness_check(app_state.clone()).await {
            Ok(status) => (probe_code(&status), status.to_string()),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready".to_string())
            }
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service not initialized".to_string(),
        ),
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match &state.app_state {
        Some(app_state) => match HealthCheck::liveness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus text exposition of every `room_swarm_*` family
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(body) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Coordinator counters, swarm summary and every session snapshot
async fn stats_handler(State(state): State<HealthServerState>) -> Response {
    let app_state = match &state.app_state {
        Some(app_state) => app_state.clone(),
        None => return unavailable("Service not initialized").into_response(),
    };

    let stats = json!({
        "service": {
            "name": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": app_state.uptime().as_secs()
        },
        "coordinator": app_state.coordinator_stats(),
        "swarm": app_state.swarm_summary(),
        "session_tasks": app_state.launcher().active_tasks(),
        "sessions": app_state.registry().snapshots(),
        "timestamp": chrono::Utc::now()
    });
    (StatusCode::OK, Json(stats)).into_response()
}

/// Sessions targeting one room, by sequence id
async fn room_handler(
    State(state): State<HealthServerState>,
    Path(name): Path<String>,
) -> Response {
    let app_state = match &state.app_state {
        Some(app_state) => app_state.clone(),
        None => return unavailable("Service not initialized").into_response(),
    };

    let mut sessions = app_state.registry().snapshots_for_room(&name);
    if sessions.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "room": name, "error": "No sessions for room" })),
        )
            .into_response();
    }
    sessions.sort_by_key(|snapshot| snapshot.sequence_id);

    let seats: Vec<_> = sessions.iter().filter_map(|s| s.seat).collect();
    let roles: Vec<_> = sessions.iter().filter_map(|s| s.role).collect();
    Json(json!({
        "room": name,
        "sessions": sessions.len(),
        "seats": seats,
        "roles": roles,
        "snapshots": sessions,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LoopbackConnector, LoopbackHub};
    use crate::config::AppConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for oneshot

    fn collector() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().expect("Failed to create collector"))
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());
        let response = server.create_router().oneshot(request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let collector = collector();
        collector.record_seat_claimed();
        collector.update_health_status(2);

        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let response = server
            .create_router()
            .oneshot(request("/metrics"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("room_swarm_seats_claimed_total 1"));
    }

    #[tokio::test]
    async fn test_health_endpoints_without_app_state() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());
        let app = server.create_router();

        for uri in ["/health", "/ready", "/alive", "/stats"] {
            let response = app.clone().oneshot(request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_stats_with_app_state() {
        let connector = Arc::new(LoopbackConnector::new(LoopbackHub::new()));
        let app_state = Arc::new(AppState::new(AppConfig::default(), connector).unwrap());
        let server = HealthServer::new(HealthServerConfig::default(), app_state.metrics())
            .with_app_state(app_state);

        let response = server
            .create_router()
            .oneshot(request("/stats"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats["service"]["name"], "room-swarm");
        assert_eq!(stats["swarm"]["sessions"], 0);
        assert_eq!(stats["session_tasks"], 0);
        assert_eq!(stats["coordinator"]["batches_spawned"], 0);
    }

    #[test]
    fn test_health_server_config() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_404_handling() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());
        let response = server
            .create_router()
            .oneshot(request("/nonexistent"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_room_view_lists_sessions_by_sequence() {
        use crate::bot::{SessionObserver, SessionSnapshot};
        use crate::types::ClientState;

        let connector = Arc::new(LoopbackConnector::new(LoopbackHub::new()));
        let app_state = Arc::new(AppState::new(AppConfig::default(), connector).unwrap());
        for sequence_id in [1usize, 0] {
            app_state.registry().on_update(&SessionSnapshot {
                batch_id: uuid::Uuid::nil(),
                room_name: "alpha".to_string(),
                sequence_id,
                nickname: format!("Player_{}", sequence_id),
                actor_id: Some(sequence_id as i32 + 2),
                state: ClientState::Joined,
                seat: Some(sequence_id as u32 + 3),
                role: None,
                position: (0, 0),
                last_rtt_ms: None,
                received_count_me: 0,
                events_handled: 0,
                handler_errors: 0,
                updated_at: chrono::Utc::now(),
            });
        }
        let app = HealthServer::new(HealthServerConfig::default(), app_state.metrics())
            .with_app_state(app_state)
            .create_router();

        let response = app.clone().oneshot(request("/rooms/alpha")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["sessions"], 2);
        assert_eq!(view["seats"], json!([3, 4]));

        let response = app.oneshot(request("/rooms/beta")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
