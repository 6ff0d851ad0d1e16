//! Main application state and service coordination
//!
//! `AppState` is the process context object: it owns the configuration,
//! metrics, the swarm registry, the session launcher and every background
//! task, and is handed to whoever needs them instead of living in a global.

use crate::bot::{Scheduler, SwarmRegistry, SwarmSummary};
use crate::client::{connect_with_retry, ConnectRequest, ServiceConnector};
use crate::config::AppConfig;
use crate::lobby::{CoordinatorStats, LobbyCoordinator, TaskLauncher};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use anyhow::Result;
use std::sync::{Arc, RwLock as StdRwLock};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Game service connection error: {message}")]
    Connection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Opens every connection: the coordinator's and each bot's
    connector: Arc<dyn ServiceConnector>,

    metrics: Arc<MetricsCollector>,

    /// Latest snapshot of every bot session
    registry: Arc<SwarmRegistry>,

    launcher: Arc<TaskLauncher>,

    coordinator_stats: Arc<StdRwLock<CoordinatorStats>>,

    /// Created on start, so the health endpoints can see this state
    metrics_service: Mutex<Option<MetricsService>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    started_at: Instant,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig, connector: Arc<dyn ServiceConnector>) -> Result<Self, ServiceError> {
        info!("Initializing room-swarm bot fleet");
        info!(
            "Configuration: service={}, address={}, spawn_policy={}",
            config.service.name, config.connection.address, config.bots.spawn_policy
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);
        let registry = Arc::new(SwarmRegistry::new());
        let launcher = Arc::new(
            TaskLauncher::new(
                connector.clone(),
                config.connection.clone(),
                config.scheduler.clone(),
                &config.bots,
                metrics.clone(),
            )
            .with_observer(registry.clone()),
        );

        Ok(Self {
            config,
            connector,
            metrics,
            registry,
            launcher,
            coordinator_stats: Arc::new(StdRwLock::new(CoordinatorStats::default())),
            metrics_service: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            started_at: Instant::now(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start health endpoints, the lobby coordinator and maintenance tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting room-swarm service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.start_coordinator().await?;
        self.start_health_metrics_task().await;

        info!("✅ Room-swarm service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of room-swarm service");

        *self.is_running.write().await = false;

        self.launcher.shutdown();
        self.stop_background_tasks().await;

        // Dropping the service also drops its handle on this state
        if let Some(metrics_service) = self.metrics_service.lock().await.take() {
            info!("Stopping metrics service...");
            if let Err(e) = metrics_service.stop().await {
                warn!("Failed to stop metrics service: {}", e);
            } else {
                info!("✅ Metrics service stopped");
            }
        }

        info!("Final swarm summary: {:?}", self.swarm_summary());
        info!("Final coordinator statistics: {:?}", self.coordinator_stats());
        info!("✅ Room-swarm service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn registry(&self) -> Arc<SwarmRegistry> {
        self.registry.clone()
    }

    pub fn launcher(&self) -> Arc<TaskLauncher> {
        self.launcher.clone()
    }

    pub fn swarm_summary(&self) -> SwarmSummary {
        self.registry.summary()
    }

    /// Current coordinator statistics, `None` if the lock is poisoned
    pub fn coordinator_stats(&self) -> Option<CoordinatorStats> {
        self.coordinator_stats.read().ok().map(|stats| stats.clone())
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Start metrics and health endpoints
    async fn start_metrics_service(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.health_port;
        info!("Starting metrics and health endpoints on port {}", port);

        let health_config = HealthServerConfig {
            port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics.clone()).with_app_state(self.clone()),
        );
        let metrics_service = MetricsService::new(self.metrics.clone(), health_server);

        let server = metrics_service.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        *self.metrics_service.lock().await = Some(metrics_service);
        self.background_tasks.lock().await.push(handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    /// Connect the coordinator and run it on its own task
    async fn start_coordinator(&self) -> Result<(), ServiceError> {
        let request = ConnectRequest {
            address: self.config.connection.address.clone(),
            app_id: self.config.connection.app_id.clone(),
            app_version: self.config.connection.app_version.clone(),
            nickname: format!("{}-coordinator", self.config.service.name),
        };
        let client = connect_with_retry(
            self.connector.as_ref(),
            &request,
            &self.config.connection.retry_policy(),
        )
        .await
        .map_err(|e| ServiceError::Connection {
            message: format!("Coordinator could not connect: {:#}", e),
        })?;

        let mut coordinator = LobbyCoordinator::new(
            client,
            self.config.bots.clone(),
            self.launcher.clone(),
            self.metrics.clone(),
        )
        .with_stats(self.coordinator_stats.clone());
        let scheduler = Scheduler::new(&self.config.scheduler, std::time::Instant::now());

        let handle = tokio::spawn(
            async move {
                info!("Lobby coordinator started");
                scheduler.run(&mut coordinator).await;
            }
            .instrument(info_span!("coordinator")),
        );
        self.background_tasks.lock().await.push(handle);
        Ok(())
    }

    /// Periodically refresh uptime and component health gauges
    async fn start_health_metrics_task(&self) {
        let metrics_service = match self.metrics_service.lock().await.clone() {
            Some(service) => service,
            None => {
                warn!("Metrics service not running, health gauges stay unset");
                return;
            }
        };
        let launcher = self.launcher.clone();
        let is_running = self.is_running.clone();
        let started_at = self.started_at;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            info!("Health metrics task started");

            while *is_running.read().await {
                interval.tick().await;

                let uptime = started_at.elapsed();
                let session_tasks = launcher.active_tasks();
                metrics_service.refresh(uptime, session_tasks);

                debug!(
                    "Updated service health metrics - uptime: {}s, session tasks: {}",
                    uptime.as_secs(),
                    session_tasks
                );
            }

            info!("Health metrics task stopped");
        });
        self.background_tasks.lock().await.push(handle);
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LoopbackConnector, LoopbackHub};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.health_port = 0;
        config.connection.retry_attempts = 1;
        config.connection.initial_retry_delay_ms = 1;
        config
    }

    #[tokio::test]
    async fn test_new_state_is_not_running() {
        let hub = LoopbackHub::new();
        let state =
            AppState::new(test_config(), Arc::new(LoopbackConnector::new(hub))).unwrap();

        assert!(!state.is_running().await);
        assert!(state.registry().is_empty());
        assert_eq!(state.coordinator_stats().unwrap().batches_spawned, 0);
    }

    #[tokio::test]
    async fn test_coordinator_connect_failure_is_reported() {
        let hub = LoopbackHub::new();
        let connector = LoopbackConnector::with_refusals(hub, 10);
        let state = Arc::new(AppState::new(test_config(), Arc::new(connector)).unwrap());

        let result = state.start_coordinator().await;
        assert!(matches!(result, Err(ServiceError::Connection { .. })));
    }
}
