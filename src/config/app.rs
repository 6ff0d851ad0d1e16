//! Main application configuration
//!
//! Configuration is read from a TOML file or from environment variables on
//! top of defaults, and validated before use.

use super::{BotSettings, SchedulerConfig, SimulationSettings, SpawnPolicy};
use crate::client::RetryPolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub connection: ConnectionSettings,
    pub scheduler: SchedulerConfig,
    pub bots: BotSettings,
    pub simulation: SimulationSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Game service connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Master server address; `loopback` selects the in-process service
    pub address: String,
    pub app_id: String,
    pub app_version: String,
    /// Connection attempts per bot before giving up
    pub retry_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "room-swarm".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            address: "loopback".to_string(),
            app_id: "room-swarm".to_string(),
            app_version: "1.0".to_string(),
            retry_attempts: 5,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 10_000,
        }
    }
}

impl ConnectionSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_delay: Duration::from_millis(self.initial_retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = parse_env("HEALTH_PORT")? {
            self.service.health_port = port;
        }
        if let Some(timeout) = parse_env("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Connection settings
        if let Ok(address) = env::var("SERVICE_ADDRESS") {
            self.connection.address = address;
        }
        if let Ok(app_id) = env::var("APP_ID") {
            self.connection.app_id = app_id;
        }
        if let Ok(app_version) = env::var("APP_VERSION") {
            self.connection.app_version = app_version;
        }
        if let Some(attempts) = parse_env("CONNECT_RETRY_ATTEMPTS")? {
            self.connection.retry_attempts = attempts;
        }
        if let Some(delay) = parse_env("CONNECT_RETRY_DELAY_MS")? {
            self.connection.initial_retry_delay_ms = delay;
        }
        if let Some(delay) = parse_env("CONNECT_MAX_RETRY_DELAY_MS")? {
            self.connection.max_retry_delay_ms = delay;
        }

        // Scheduler settings
        if let Some(quantum) = parse_env("TICK_QUANTUM_MS")? {
            self.scheduler.tick_quantum_ms = quantum;
        }
        if let Some(interval) = parse_env("DISPATCH_INTERVAL_MS")? {
            self.scheduler.dispatch_interval_ms = interval;
        }
        if let Some(interval) = parse_env("FLUSH_INTERVAL_MS")? {
            self.scheduler.flush_interval_ms = interval;
        }
        if let Some(interval) = parse_env("IDLE_INTERVAL_MS")? {
            self.scheduler.idle_interval_ms = interval;
        }
        if let Some(interval) = parse_env("NOTIFY_INTERVAL_MS")? {
            self.scheduler.notify_interval_ms = interval;
        }

        // Bot settings
        if let Ok(prefix) = env::var("BOT_NICKNAME_PREFIX") {
            self.bots.nickname_prefix = prefix;
        }
        if let Some(reliable) = parse_env("BOT_RELIABLE_POSITION")? {
            self.bots.reliable_position = reliable;
        }
        if let Some(probe) = parse_env("BOT_PROBE_ON_NOTIFY")? {
            self.bots.probe_on_notify = probe;
        }
        if let Some(policy) = parse_env::<SpawnPolicy>("BOT_SPAWN_POLICY")? {
            self.bots.spawn_policy = policy;
        }
        if let Some(cap) = parse_env("BOT_MAX_PER_BATCH")? {
            self.bots.max_bots_per_batch = cap;
        }

        // Simulation settings
        if let Some(enabled) = parse_env("SIMULATION_ENABLED")? {
            self.simulation.enabled = enabled;
        }
        if let Some(seconds) = parse_env("SIMULATION_RUN_SECONDS")? {
            self.simulation.run_seconds = seconds;
        }
        if let Some(delay) = parse_env("SIMULATION_KICKOFF_DELAY_MS")? {
            self.simulation.kickoff_delay_ms = delay;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Backoff policy for bot connections
    pub fn retry_policy(&self) -> RetryPolicy {
        self.connection.retry_policy()
    }

    /// Whether the in-process game service is selected
    pub fn uses_loopback(&self) -> bool {
        self.connection.address.eq_ignore_ascii_case("loopback")
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate connection settings
    if config.connection.address.is_empty() {
        return Err(anyhow!("Service address cannot be empty"));
    }
    if config.connection.retry_attempts == 0 {
        return Err(anyhow!("Connection retry attempts must be at least 1"));
    }
    if config.connection.initial_retry_delay_ms > config.connection.max_retry_delay_ms {
        return Err(anyhow!(
            "Initial retry delay {}ms exceeds max retry delay {}ms",
            config.connection.initial_retry_delay_ms,
            config.connection.max_retry_delay_ms
        ));
    }

    // Validate scheduler settings
    let scheduler = &config.scheduler;
    for (name, value) in [
        ("tick quantum", scheduler.tick_quantum_ms),
        ("dispatch interval", scheduler.dispatch_interval_ms),
        ("flush interval", scheduler.flush_interval_ms),
        ("idle interval", scheduler.idle_interval_ms),
        ("notify interval", scheduler.notify_interval_ms),
    ] {
        if value == 0 {
            return Err(anyhow!("Scheduler {} must be greater than 0", name));
        }
    }

    if config.bots.nickname_prefix.is_empty() {
        return Err(anyhow!("Bot nickname prefix cannot be empty"));
    }

    // Validate simulated rooms
    let mut names = HashSet::new();
    for room in &config.simulation.rooms {
        if room.name.is_empty() {
            return Err(anyhow!("Simulated room name cannot be empty"));
        }
        if !names.insert(room.name.as_str()) {
            return Err(anyhow!("Duplicate simulated room: {}", room.name));
        }
        if room.max_players == 0 {
            return Err(anyhow!("Room {} must allow at least one player", room.name));
        }
        if room.seated == 0 || room.seated > room.max_players {
            return Err(anyhow!(
                "Room {} must seat between 1 and {} host players",
                room.name,
                room.max_players
            ));
        }
    }

    Ok(())
}
