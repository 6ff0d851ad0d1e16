//! Seat and role allocation for a spawn batch
//!
//! Every bot spawned to fill one room opening shares a `RoomSharedState`.
//! The first bot whose join succeeds computes the free seat pool from the
//! room's `gameState`; every later bot reads the published pool. The pool is
//! never recomputed once published.

use crate::error::{Result, SwarmError};
use crate::protocol::GameState;
use crate::types::{RoleId, SeatNumber};
use crate::utils::{current_timestamp, generate_batch_id};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// A published seat pool and who published it
#[derive(Debug, Clone, PartialEq)]
struct PublishedPool {
    seats: Arc<[SeatNumber]>,
    published_by: usize,
}

/// Result of consulting the shared pool
#[derive(Debug, Clone, PartialEq)]
pub struct SeatPoolAccess {
    pub seats: Arc<[SeatNumber]>,
    /// True only for the bot that computed and published the pool
    pub published_now: bool,
}

/// Allocation state shared by one batch of bots
#[derive(Debug)]
pub struct RoomSharedState {
    batch_id: Uuid,
    room_name: String,
    batch_size: usize,
    created_at: DateTime<Utc>,
    pool: Mutex<Option<PublishedPool>>,
}

impl RoomSharedState {
    pub fn new(room_name: impl Into<String>, batch_size: usize) -> Self {
        Self {
            batch_id: generate_batch_id(),
            room_name: room_name.into(),
            batch_size,
            created_at: current_timestamp(),
            pool: Mutex::new(None),
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Return the published pool, publishing it first if nobody has yet.
    ///
    /// `compute` runs at most once per successful publication and only under
    /// the pool guard. If it fails, the pool stays unpublished and the next
    /// caller gets to try. An empty pool counts as published.
    pub fn seat_pool_or_publish<F>(&self, sequence_id: usize, compute: F) -> Result<SeatPoolAccess>
    where
        F: FnOnce() -> Result<Vec<SeatNumber>>,
    {
        let mut guard = self.pool.lock().map_err(|_| SwarmError::InternalError {
            message: format!("seat pool lock poisoned for batch {}", self.batch_id),
        })?;

        if let Some(published) = guard.as_ref() {
            debug!(
                "Bot {} reads seat pool of batch {} published by bot {}",
                sequence_id, self.batch_id, published.published_by
            );
            return Ok(SeatPoolAccess {
                seats: published.seats.clone(),
                published_now: false,
            });
        }

        let seats: Arc<[SeatNumber]> = compute()?.into();
        info!(
            "Bot {} published seat pool {:?} for room {} (batch {})",
            sequence_id, seats, self.room_name, self.batch_id
        );
        *guard = Some(PublishedPool {
            seats: seats.clone(),
            published_by: sequence_id,
        });

        Ok(SeatPoolAccess {
            seats,
            published_now: true,
        })
    }

    /// The pool if it has been published
    pub fn published_seats(&self) -> Option<Arc<[SeatNumber]>> {
        self.pool
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|p| p.seats.clone()))
    }
}

/// Ascending 1-based seat slots that are missing or empty in `gameState.seats`
pub fn free_seat_pool(state: &GameState, max_players: u8) -> Vec<SeatNumber> {
    (1..=SeatNumber::from(max_players))
        .filter(|slot| state.is_seat_free(*slot as usize))
        .collect()
}

/// Seat claimed by the bot with `sequence_id`, if the pool reaches that far
pub fn seat_for(pool: &[SeatNumber], sequence_id: usize, max_players: u8) -> Option<SeatNumber> {
    pool.get(sequence_id)
        .map(|slot| slot % (SeatNumber::from(max_players) + 1))
}

/// Index of the last empty role slot in `1..len`, or `len` if none is empty
pub fn select_role_slot(state: &GameState) -> usize {
    let len = state.roles.len();
    let mut selected = len;
    for slot in 1..len {
        if state.is_role_free(slot) {
            selected = slot;
        }
    }
    selected
}

/// Role id for a bot given the selected slot; `None` for a room without seats
pub fn role_for(slot: usize, sequence_id: usize, max_players: u8) -> Option<RoleId> {
    if max_players == 0 {
        return None;
    }
    let raw = slot as i64 + sequence_id as i64 - 1;
    Some(raw.rem_euclid(i64::from(max_players)) as RoleId)
}
