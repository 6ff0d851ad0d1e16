//! Event codes shared between bots
//!
//! The values are a private contract between clients of the same game; the
//! service routes them without interpreting them. Built-in service codes
//! live at the top of the byte range.

use serde::{Deserialize, Serialize};

/// Every event code the swarm sends or reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventCode {
    PlayerInfo = 0,
    PlayerMove = 1,
    CountMe = 3,
    TakeSeat = 4,
    StartChoosingRole = 5,
    ChooseRole = 6,
    VotingEnded = 18,
    UpdateCurrentTurn = 36,
    UpdateCurrentActor = 37,
    LobbyStats = 224,
    AppStats = 226,
    GameListUpdate = 229,
    PropertiesChanged = 253,
    Leave = 254,
    Join = 255,
}

impl EventCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Label used for metrics and log lines
    pub fn name(self) -> &'static str {
        match self {
            EventCode::PlayerInfo => "player_info",
            EventCode::PlayerMove => "player_move",
            EventCode::CountMe => "count_me",
            EventCode::TakeSeat => "take_seat",
            EventCode::StartChoosingRole => "start_choosing_role",
            EventCode::ChooseRole => "choose_role",
            EventCode::VotingEnded => "voting_ended",
            EventCode::UpdateCurrentTurn => "update_current_turn",
            EventCode::UpdateCurrentActor => "update_current_actor",
            EventCode::LobbyStats => "lobby_stats",
            EventCode::AppStats => "app_stats",
            EventCode::GameListUpdate => "game_list_update",
            EventCode::PropertiesChanged => "properties_changed",
            EventCode::Leave => "leave",
            EventCode::Join => "join",
        }
    }
}

impl TryFrom<u8> for EventCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        let code = match value {
            0 => EventCode::PlayerInfo,
            1 => EventCode::PlayerMove,
            3 => EventCode::CountMe,
            4 => EventCode::TakeSeat,
            5 => EventCode::StartChoosingRole,
            6 => EventCode::ChooseRole,
            18 => EventCode::VotingEnded,
            36 => EventCode::UpdateCurrentTurn,
            37 => EventCode::UpdateCurrentActor,
            224 => EventCode::LobbyStats,
            226 => EventCode::AppStats,
            229 => EventCode::GameListUpdate,
            253 => EventCode::PropertiesChanged,
            254 => EventCode::Leave,
            255 => EventCode::Join,
            other => return Err(other),
        };
        Ok(code)
    }
}

impl std::fmt::Display for EventCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}
