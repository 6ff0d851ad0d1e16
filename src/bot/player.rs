//! Player records
//!
//! `Player` holds what every participant has (identity, color, board
//! position). `LocalPlayer` composes it with what only a bot tracks about
//! itself: its batch sequence id, claimed seat and role.

use crate::protocol::{PlayerInfoPayload, PlayerMovePayload};
use crate::types::{ActorId, RoleId, SeatNumber, GRID_SIZE};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub actor_id: Option<ActorId>,
    pub name: String,
    /// RGB packed into an integer
    pub color: i32,
    x: i32,
    y: i32,
}

impl Player {
    /// Remote player as first seen in a room roster
    pub fn remote(actor_id: ActorId, name: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id),
            name: name.into(),
            color: 0,
            x: 0,
            y: 0,
        }
    }

    /// Fresh player with a random position and color
    pub fn random<R: Rng + ?Sized>(name: impl Into<String>, rng: &mut R) -> Self {
        Self {
            actor_id: None,
            name: name.into(),
            color: random_color(rng),
            x: rng.gen_range(0..GRID_SIZE),
            y: rng.gen_range(0..GRID_SIZE),
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
        self.clamp();
    }

    /// Move by a relative step, stopping at the board edges
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.x = self.x.saturating_add(dx);
        self.y = self.y.saturating_add(dy);
        self.clamp();
    }

    /// Step each axis by -1, 0 or +1
    pub fn random_walk<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let dx = rng.gen_range(-1..=1);
        let dy = rng.gen_range(-1..=1);
        self.move_by(dx, dy);
    }

    fn clamp(&mut self) {
        self.x = self.x.clamp(0, GRID_SIZE - 1);
        self.y = self.y.clamp(0, GRID_SIZE - 1);
    }

    pub fn info_payload(&self) -> PlayerInfoPayload {
        PlayerInfoPayload {
            name: self.name.clone(),
            color: self.color,
        }
    }

    pub fn move_payload(&self) -> PlayerMovePayload {
        // Both axes are clamped into the grid, which fits a byte
        PlayerMovePayload {
            x: self.x as u8,
            y: self.y as u8,
        }
    }

    pub fn apply_info(&mut self, info: &PlayerInfoPayload) {
        self.name = info.name.clone();
        self.color = info.color;
    }

    /// Overwrite the position from a received move
    pub fn apply_move(&mut self, movement: &PlayerMovePayload) {
        self.set_position(i32::from(movement.x), i32::from(movement.y));
    }
}

pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(0..=0x00ff_ffff)
}

/// The bot's own participant record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPlayer {
    pub player: Player,
    /// 0-based id within the spawn batch
    pub sequence_id: usize,
    pub seat: Option<SeatNumber>,
    pub role: Option<RoleId>,
    /// Character class advertised in actor properties
    pub class: String,
}

impl LocalPlayer {
    pub fn new<R: Rng + ?Sized>(nickname_prefix: &str, sequence_id: usize, rng: &mut R) -> Self {
        let name = format!("{}{}", nickname_prefix, sequence_id);
        Self {
            player: Player::random(name, rng),
            sequence_id,
            seat: None,
            role: None,
            class: format!("tank{}", rng.gen_range(0..99)),
        }
    }

    pub fn actor_id(&self) -> Option<ActorId> {
        self.player.actor_id
    }

    pub fn name(&self) -> &str {
        &self.player.name
    }
}
