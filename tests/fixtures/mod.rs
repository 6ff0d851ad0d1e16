//! Test fixtures for driving sessions and the coordinator over the loopback service

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use room_swarm::bot::{BotAssignment, BotSession, RoomSharedState, ScheduledClient, SessionSettings};
use room_swarm::client::{GameClient, Incoming, LoopbackClient, LoopbackHub};
use room_swarm::error::Result;
use room_swarm::lobby::SessionLauncher;
use room_swarm::metrics::MetricsCollector;
use room_swarm::protocol::{GameState, RawEvent};
use room_swarm::types::RoomOptions;
use std::sync::{Arc, Mutex};

pub fn metrics() -> Arc<MetricsCollector> {
    Arc::new(MetricsCollector::new().expect("metrics collector"))
}

/// Open a room owned by a single host connection and drop its setup chatter
pub fn host_room(hub: &LoopbackHub, name: &str, max_players: u8, state: &GameState) -> LoopbackClient {
    let mut host = hub.register_client(&format!("{}-host", name));
    host.create_room(
        name,
        RoomOptions {
            max_players,
            is_open: true,
            properties: state.to_properties().expect("gameState properties"),
        },
    )
    .expect("room created");
    drain(&mut host);
    host
}

/// Deterministic session on the hub
pub fn session(hub: &LoopbackHub, shared: &Arc<RoomSharedState>, sequence_id: usize) -> BotSession {
    let settings = SessionSettings {
        probe_on_notify: false,
        ..SessionSettings::default()
    };
    BotSession::with_rng(
        Box::new(hub.register_client(&format!("Player_{}", sequence_id))),
        BotAssignment {
            room_name: shared.room_name().to_string(),
            sequence_id,
            shared: shared.clone(),
        },
        settings,
        metrics(),
        StdRng::seed_from_u64(sequence_id as u64 + 7),
    )
}

/// One dispatch then one flush
pub fn pump<C: ScheduledClient + ?Sized>(client: &mut C) {
    client.dispatch_incoming();
    client.flush_outgoing();
}

pub fn drain(client: &mut LoopbackClient) -> Vec<Incoming> {
    std::iter::from_fn(|| client.poll_incoming()).collect()
}

/// Events with `code` the hub accepted for a room
pub fn logged(hub: &LoopbackHub, room_name: &str, code: u8) -> Vec<RawEvent> {
    hub.events_in(room_name)
        .into_iter()
        .filter(|event| event.code == code)
        .collect()
}

/// Launcher that only remembers what it was asked to start
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<BotAssignment>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<BotAssignment> {
        self.launched
            .lock()
            .map(|launched| launched.clone())
            .unwrap_or_default()
    }

    pub fn count_for(&self, room_name: &str) -> usize {
        self.launched()
            .iter()
            .filter(|assignment| assignment.room_name == room_name)
            .count()
    }
}

impl SessionLauncher for RecordingLauncher {
    fn launch(&self, assignment: BotAssignment) -> Result<()> {
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(assignment);
        }
        Ok(())
    }
}
