//! Metrics and monitoring for the room-swarm bot fleet
//!
//! Prometheus counters for sessions, allocation and the coordinator, plus the
//! HTTP server exposing them next to the health endpoints.

pub mod collector;
pub mod health;

pub use collector::{
    AllocationMetrics, CoordinatorMetrics, MetricsCollector, MetricsTimer, ServiceMetrics,
    SessionMetrics,
};
pub use health::HealthServer;

use std::sync::Arc;
use std::time::Duration;

/// Health endpoints plus the gauges they report on
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    /// Serve the health and metrics endpoints until stopped
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }

    /// Refresh uptime and component gauges. The session component counts as
    /// healthy while at least one session task is alive.
    pub fn refresh(&self, uptime: Duration, session_tasks: usize) {
        self.collector.set_uptime(uptime);
        self.collector.update_health_status(2);
        self.collector.update_component_health("coordinator", true);
        self.collector
            .update_component_health("sessions", session_tasks > 0);
    }
}
