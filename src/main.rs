//! Main entry point for the Room Swarm bot fleet
//!
//! Loads configuration, initializes logging, starts the lobby coordinator
//! and its bot sessions, and shuts everything down gracefully.

use anyhow::Result;
use clap::Parser;
use room_swarm::client::{LoopbackConnector, LoopbackHub};
use room_swarm::config::{validate_config, AppConfig, SpawnPolicy};
use room_swarm::service::{AppState, HealthCheck};
use room_swarm::simulation::SimulationHost;
use room_swarm::SwarmError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Room Swarm - bots that fill open rooms and play the control protocol
#[derive(Parser)]
#[command(
    name = "room-swarm",
    version,
    about = "A synthetic bot fleet for room-based matchmaking services",
    long_about = "Room Swarm watches the lobby of a room-based game service, spawns one bot \
                 session per free seat in every open room and drives the seat, role and turn \
                 control events those rooms expect. A built-in loopback service with scripted \
                 hosts makes it runnable without any external server."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Game service address override
    #[arg(long, value_name = "ADDRESS", help = "Override game service address")]
    address: Option<String>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health/metrics server port")]
    health_port: Option<u16>,

    /// Spawn policy override
    #[arg(long, value_enum, help = "How repeated room notifications are handled")]
    spawn_policy: Option<SpawnPolicy>,

    /// Run against the in-process service with scripted hosts
    #[arg(long, help = "Enable the loopback simulation")]
    simulate: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS", help = "Stop after this many seconds")]
    run_seconds: Option<u64>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting the swarm"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Resolve on a signal or once the configured run time is over
async fn wait_for_stop(run_duration: Option<Duration>) {
    match run_duration {
        Some(duration) => {
            tokio::select! {
                _ = wait_for_shutdown_signal() => {},
                _ = sleep(duration) => {
                    info!("Configured run time of {:?} elapsed", duration);
                },
            }
        }
        None => wait_for_shutdown_signal().await,
    }
}

/// Log a health summary periodically
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} rooms known, {} bots spawned, {} seated",
                    health.status,
                    health.stats.rooms_known,
                    health.stats.bots_spawned,
                    health.stats.sessions_seated
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Room Swarm Bot Fleet");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Game service: {}", config.connection.address);
    info!("   Spawn policy: {}", config.bots.spawn_policy);
    info!(
        "   Tick quantum: {}ms",
        config.scheduler.tick_quantum_ms
    );
    info!(
        "   Simulation: {} ({} room(s))",
        config.simulation.enabled,
        config.simulation.rooms.len()
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file or environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(address) = &args.address {
        config.connection.address = address.clone();
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    if let Some(spawn_policy) = args.spawn_policy {
        config.bots.spawn_policy = spawn_policy;
    }

    if args.simulate {
        config.simulation.enabled = true;
    }

    if let Some(run_seconds) = args.run_seconds {
        config.simulation.run_seconds = run_seconds;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting the swarm");
        return Ok(());
    }

    display_startup_banner(&config);

    // Only the in-process service ships with this binary
    if !config.simulation.enabled || !config.uses_loopback() {
        let e = SwarmError::ConfigurationError {
            message: format!(
                "no connector available for game service '{}'; run with --simulate against the loopback service",
                config.connection.address
            ),
        };
        error!("{}", e);
        std::process::exit(1);
    }

    let hub = LoopbackHub::new();
    let mut host = SimulationHost::new(hub.clone(), config.simulation.clone());
    if let Err(e) = host.setup() {
        error!("Failed to set up simulated rooms: {:#}", e);
        std::process::exit(1);
    }

    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone(), Arc::new(LoopbackConnector::new(hub))) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = tokio::spawn(health_check_task(app_state.clone()));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let scheduler = config.scheduler.clone();
    let host_task = tokio::spawn(async move {
        host.run_until(&scheduler, async {
            let _ = stop_rx.await;
        })
        .await
    });

    info!("✅ Room Swarm is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_stop(config.simulation.run_duration()).await;

    info!("🛑 Stop requested, beginning graceful shutdown...");
    health_task.abort();
    let _ = stop_tx.send(());

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    match host_task.await {
        Ok(host) => {
            for activity in host.activity() {
                info!(
                    "Room {}: {} seat(s), {} role(s), {} voting ended, {} token hand(s), kicked off: {}",
                    activity.room_name,
                    activity.seats_claimed,
                    activity.roles_claimed,
                    activity.voting_ended,
                    activity.tokens_passed,
                    activity.kicked_off
                );
            }
        }
        Err(e) => warn!("Simulation host task failed: {}", e),
    }

    info!("🛑 Room Swarm stopped");
    Ok(())
}
