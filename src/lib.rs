//! Room Swarm - synthetic bot fleet for room-based matchmaking services
//!
//! This crate watches a game service lobby, fills every open room with bot
//! sessions and drives the seat, role and turn control protocol those rooms
//! expect from their players.

pub mod bot;
pub mod client;
pub mod config;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod protocol;
pub mod service;
pub mod simulation;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{Result, SwarmError};
pub use types::*;

// Re-export key components
pub use bot::{BotSession, RoomSharedState};
pub use client::{GameClient, ServiceConnector};
pub use lobby::LobbyCoordinator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
