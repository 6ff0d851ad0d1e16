//! Error types for the bot swarm
//!
//! Domain failures are expressed with `SwarmError`; everything else flows
//! through anyhow so call sites can attach context.

use crate::types::ClientState;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific swarm scenarios
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Client is not ready to join a room (state: {state:?})")]
    NotReadyToJoin { state: ClientState },

    #[error("Client is not in a room")]
    NotInRoom,

    #[error("Room not found: {room}")]
    RoomNotFound { room: String },

    #[error("Room is full: {room}")]
    RoomFull { room: String },

    #[error("Room is closed: {room}")]
    RoomClosed { room: String },

    #[error("Room {room} has no gameState property")]
    MissingGameState { room: String },

    #[error("Invalid payload for event code {code}: {reason}")]
    InvalidPayload { code: u8, reason: String },

    #[error("Unknown actor: {actor_id}")]
    UnknownActor { actor_id: i32 },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}
