//! Configuration management for the bot swarm
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values.

pub mod app;
pub mod bots;
pub mod scheduler;
pub mod simulation;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ConnectionSettings, ServiceSettings};
pub use bots::{BotSettings, SpawnPolicy};
pub use scheduler::SchedulerConfig;
pub use simulation::{SimulatedRoom, SimulationSettings};
