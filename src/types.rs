//! Common types shared by sessions, the coordinator and the client seam

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Actor number assigned by the service on join
pub type ActorId = i32;

/// 1-based seat slot within a room
pub type SeatNumber = u32;

/// 0-based game-logic role identifier
pub type RoleId = u32;

/// Heterogeneous key/value bag used for room and actor properties
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// Side length of the square board players move on
pub const GRID_SIZE: i32 = 16;

/// Room property holding the seat/role/turn bookkeeping
pub const GAME_STATE_KEY: &str = "gameState";

/// Connection state of a client handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientState {
    Disconnected,
    ConnectedToMaster,
    JoinedLobby,
    Joining,
    Joined,
    Leaving,
}

impl ClientState {
    /// Rooms may only be joined from the lobby
    pub fn is_ready_to_join(&self) -> bool {
        matches!(self, ClientState::JoinedLobby)
    }

    /// Whether the client currently sits in a room
    pub fn is_in_room(&self) -> bool {
        matches!(self, ClientState::Joined)
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientState::Disconnected => write!(f, "Disconnected"),
            ClientState::ConnectedToMaster => write!(f, "ConnectedToMaster"),
            ClientState::JoinedLobby => write!(f, "JoinedLobby"),
            ClientState::Joining => write!(f, "Joining"),
            ClientState::Joined => write!(f, "Joined"),
            ClientState::Leaving => write!(f, "Leaving"),
        }
    }
}

/// Who receives a raised event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverGroup {
    All,
    Others,
    Actor(ActorId),
}

/// An actor as the service reports it inside a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub is_local: bool,
    pub is_active: bool,
    pub properties: PropertyMap,
}

/// Snapshot of the room a client currently sits in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub max_players: u8,
    pub is_open: bool,
    /// Keyed by actor id; iteration order is ascending actor id
    pub players: BTreeMap<ActorId, Actor>,
    pub properties: PropertyMap,
}

impl Room {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn get_player(&self, actor_id: ActorId) -> Option<&Actor> {
        self.players.get(&actor_id)
    }
}

/// Directory entry for a room as seen from the lobby
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomInfo {
    pub name: String,
    pub max_players: u8,
    pub player_count: u8,
    pub is_open: bool,
    /// Set on list updates announcing the room is gone
    pub removed: bool,
}

impl RoomInfo {
    /// Seats nobody occupies yet
    pub fn free_capacity(&self) -> usize {
        self.max_players.saturating_sub(self.player_count) as usize
    }

    /// Open and not yet full
    pub fn accepts_bots(&self) -> bool {
        !self.removed && self.is_open && self.player_count < self.max_players
    }
}

/// Options for creating a room
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomOptions {
    pub max_players: u8,
    pub is_open: bool,
    pub properties: PropertyMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(player_count: u8, max_players: u8, is_open: bool) -> RoomInfo {
        RoomInfo {
            name: "room".to_string(),
            max_players,
            player_count,
            is_open,
            removed: false,
        }
    }

    #[test]
    fn test_free_capacity() {
        assert_eq!(info(1, 4, true).free_capacity(), 3);
        assert_eq!(info(4, 4, true).free_capacity(), 0);
        // A miscounted room must not underflow
        assert_eq!(info(5, 4, true).free_capacity(), 0);
    }

    #[test]
    fn test_accepts_bots() {
        assert!(info(2, 4, true).accepts_bots());
        assert!(!info(2, 4, false).accepts_bots());
        assert!(!info(4, 4, true).accepts_bots());

        let mut removed = info(0, 4, true);
        removed.removed = true;
        assert!(!removed.accepts_bots());
    }

    #[test]
    fn test_client_state_join_readiness() {
        assert!(ClientState::JoinedLobby.is_ready_to_join());
        assert!(!ClientState::ConnectedToMaster.is_ready_to_join());
        assert!(!ClientState::Joined.is_ready_to_join());
        assert!(ClientState::Joined.is_in_room());
    }
}
