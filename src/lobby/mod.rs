//! Lobby side of the swarm
//!
//! The coordinator watches the room directory from the lobby and launches
//! batches of bot sessions for rooms that still have free seats.

pub mod coordinator;
pub mod directory;

// Re-export commonly used types
pub use coordinator::{CoordinatorStats, LobbyCoordinator, SessionLauncher, TaskLauncher};
pub use directory::RoomDirectory;
