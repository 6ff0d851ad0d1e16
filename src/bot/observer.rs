//! External notification hook and the in-memory swarm registry

use crate::types::{ActorId, ClientState, RoleId, SeatNumber};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::warn;
use uuid::Uuid;

/// Point-in-time view of one bot session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub batch_id: Uuid,
    pub room_name: String,
    pub sequence_id: usize,
    pub nickname: String,
    pub actor_id: Option<ActorId>,
    pub state: ClientState,
    pub seat: Option<SeatNumber>,
    pub role: Option<RoleId>,
    pub position: (i32, i32),
    pub last_rtt_ms: Option<f64>,
    pub received_count_me: u64,
    pub events_handled: u64,
    pub handler_errors: u64,
    pub updated_at: DateTime<Utc>,
}

/// Receives periodic session updates (UI, telemetry)
pub trait SessionObserver: Send + Sync {
    fn on_update(&self, snapshot: &SessionSnapshot);
}

/// Aggregate view served on the stats endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SwarmSummary {
    pub sessions: usize,
    pub joined: usize,
    pub seated: usize,
    pub with_role: usize,
    pub average_rtt_ms: Option<f64>,
    pub handler_errors: u64,
}

type SessionKey = (String, Uuid, usize);

/// Latest snapshot of every session that reported in
#[derive(Debug, Clone, Default)]
pub struct SwarmRegistry {
    sessions: Arc<RwLock<BTreeMap<SessionKey, SessionSnapshot>>>,
}

impl SwarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        match self.sessions.read() {
            Ok(sessions) => sessions.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn snapshots_for_room(&self, room_name: &str) -> Vec<SessionSnapshot> {
        self.snapshots()
            .into_iter()
            .filter(|s| s.room_name == room_name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> SwarmSummary {
        let snapshots = self.snapshots();
        let rtts: Vec<f64> = snapshots.iter().filter_map(|s| s.last_rtt_ms).collect();
        let average_rtt_ms = if rtts.is_empty() {
            None
        } else {
            Some(rtts.iter().sum::<f64>() / rtts.len() as f64)
        };

        SwarmSummary {
            sessions: snapshots.len(),
            joined: snapshots.iter().filter(|s| s.state.is_in_room()).count(),
            seated: snapshots.iter().filter(|s| s.seat.is_some()).count(),
            with_role: snapshots.iter().filter(|s| s.role.is_some()).count(),
            average_rtt_ms,
            handler_errors: snapshots.iter().map(|s| s.handler_errors).sum(),
        }
    }
}

impl SessionObserver for SwarmRegistry {
    fn on_update(&self, snapshot: &SessionSnapshot) {
        let key = (
            snapshot.room_name.clone(),
            snapshot.batch_id,
            snapshot.sequence_id,
        );
        match self.sessions.write() {
            Ok(mut sessions) => {
                sessions.insert(key, snapshot.clone());
            }
            Err(_) => warn!("Swarm registry lock poisoned; dropping snapshot"),
        }
    }
}
