//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the bot fleet,
//! including readiness and liveness probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Fleet statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Rooms in the coordinator's directory
    pub rooms_known: usize,
    pub batches_spawned: u64,
    pub bots_spawned: u64,
    /// Session tasks still alive
    pub session_tasks: usize,
    /// Sessions that reported while inside a room
    pub sessions_joined: usize,
    pub sessions_seated: usize,
    pub average_rtt_ms: Option<f64>,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        for check in [
            Self::check_coordinator(&app_state),
            Self::check_sessions(&app_state),
            Self::check_event_handling(&app_state),
        ] {
            if check.status == HealthStatus::Unhealthy {
                overall_status = HealthStatus::Unhealthy;
            } else if check.status == HealthStatus::Degraded
                && overall_status == HealthStatus::Healthy
            {
                overall_status = HealthStatus::Degraded;
            }
            checks.push(check);
        }

        let stats = Self::gather_service_stats(&app_state);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - the coordinator has to be reachable
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }
        Ok(Self::check_coordinator(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let outcome = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };
        ComponentCheck::finished("service_running", start, outcome)
    }

    /// Degraded until the first room directory arrives
    fn check_coordinator(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let outcome = match app_state.coordinator_stats() {
            Some(stats) if stats.notifications > 0 => (HealthStatus::Healthy, None),
            Some(_) => (
                HealthStatus::Degraded,
                Some("No room directory received yet".to_string()),
            ),
            None => (
                HealthStatus::Unhealthy,
                Some("Cannot access coordinator statistics".to_string()),
            ),
        };
        ComponentCheck::finished("coordinator", start, outcome)
    }

    fn check_sessions(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let spawned = app_state
            .coordinator_stats()
            .map(|stats| stats.bots_spawned)
            .unwrap_or(0);
        let alive = app_state.launcher().active_tasks();

        let outcome = if spawned > 0 && alive == 0 {
            (
                HealthStatus::Degraded,
                Some(format!("All {} spawned sessions have stopped", spawned)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        ComponentCheck::finished("sessions", start, outcome)
    }

    /// Dropped events point at a protocol mismatch with the room hosts
    fn check_event_handling(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let summary = app_state.swarm_summary();
        let outcome = if summary.handler_errors > 0 {
            (
                HealthStatus::Degraded,
                Some(format!(
                    "{} event(s) dropped across {} session(s)",
                    summary.handler_errors, summary.sessions
                )),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        ComponentCheck::finished("event_handling", start, outcome)
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let coordinator = app_state.coordinator_stats().unwrap_or_default();
        let summary = app_state.swarm_summary();

        ServiceStats {
            rooms_known: coordinator.rooms_known,
            batches_spawned: coordinator.batches_spawned,
            bots_spawned: coordinator.bots_spawned,
            session_tasks: app_state.launcher().active_tasks(),
            sessions_joined: summary.joined,
            sessions_seated: summary.seated,
            average_rtt_ms: summary.average_rtt_ms,
            uptime_seconds: app_state.uptime().as_secs(),
        }
    }
}

impl ComponentCheck {
    fn finished(
        name: &str,
        start: std::time::Instant,
        (status, message): (HealthStatus, Option<String>),
    ) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}
