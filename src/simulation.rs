//! Scripted room hosts for loopback runs
//!
//! Each simulated room is opened by `seated` host connections that already
//! occupy seats `1..=seated`. The first host acts as the room authority: it
//! writes claimed seats and roles into `gameState`, marks every actor named
//! by an "update current actor" event as having acted, and after the kickoff
//! delay starts role selection, voting and the turn token chain.

use crate::bot::{ScheduledClient, Scheduler, Timer};
use crate::client::{GameClient, Incoming, LoopbackClient, LoopbackHub};
use crate::config::{SchedulerConfig, SimulatedRoom, SimulationSettings};
use crate::error::{Result, SwarmError};
use crate::protocol::{ActorUpdate, BotEvent, GameState, RawEvent, TurnUpdate, ACTION_VOTING};
use crate::types::{ActorId, ReceiverGroup, RoomOptions};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What happened in one simulated room
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoomActivity {
    pub room_name: String,
    pub seats_claimed: u32,
    pub roles_claimed: u32,
    pub voting_ended: u32,
    pub tokens_passed: u32,
    pub kicked_off: bool,
}

struct HostedRoom {
    config: SimulatedRoom,
    /// The first host is the room authority
    hosts: Vec<LoopbackClient>,
    host_actor_ids: Vec<ActorId>,
    state: GameState,
    activity: RoomActivity,
}

impl HostedRoom {
    fn authority(&mut self) -> Result<&mut LoopbackClient> {
        self.hosts.first_mut().ok_or_else(|| {
            SwarmError::InternalError {
                message: format!("room {} has no host", self.config.name),
            }
            .into()
        })
    }

    fn publish_state(&mut self) -> Result<()> {
        let properties = self.state.to_properties()?;
        self.authority()?.set_room_properties(properties)
    }

    /// Lowest joined actor that is not a host
    fn first_bot(&self) -> Option<ActorId> {
        let room = self.hosts.first()?.current_room()?;
        room.players
            .keys()
            .copied()
            .find(|id| !self.host_actor_ids.contains(id))
    }

    fn apply(&mut self, event: &RawEvent) -> Result<()> {
        let sender = match event.sender {
            Some(sender) => sender,
            None => return Ok(()),
        };

        match BotEvent::decode(event)? {
            BotEvent::TakeSeat(change) => {
                self.state
                    .occupy_seat(change.new_seat_number as usize, json!(sender));
                self.activity.seats_claimed += 1;
                self.publish_state()?;
            }
            BotEvent::ChooseRole(change) => {
                self.state.occupy_role(change.new_role_id as usize, json!(sender));
                self.activity.roles_claimed += 1;
                self.publish_state()?;
            }
            BotEvent::UpdateCurrentActor(update) => {
                if !self.state.has_acted(update.actor_nr) {
                    self.state.already_acted.push(update.actor_nr.to_string());
                }
                self.activity.tokens_passed += 1;
                self.publish_state()?;
            }
            BotEvent::VotingEnded => self.activity.voting_ended += 1,
            _ => {}
        }
        Ok(())
    }

    fn kickoff(&mut self) -> Result<()> {
        let first_bot = match self.first_bot() {
            Some(actor) => actor,
            None => return Ok(()),
        };

        let host = self.authority()?;
        host.raise_event(BotEvent::StartChoosingRole.to_outgoing(true, ReceiverGroup::All)?)?;
        host.raise_event(
            BotEvent::UpdateCurrentTurn(TurnUpdate {
                action: ACTION_VOTING.to_string(),
            })
            .to_outgoing(true, ReceiverGroup::All)?,
        )?;
        host.raise_event(
            BotEvent::UpdateCurrentActor(ActorUpdate::authing(first_bot))
                .to_outgoing(true, ReceiverGroup::All)?,
        )?;
        host.flush_outgoing()?;

        self.activity.kicked_off = true;
        info!(
            "Kicked off room {}: role selection, voting and token to actor {}",
            self.config.name, first_bot
        );
        Ok(())
    }
}

/// Scripted host for every simulated room
pub struct SimulationHost {
    hub: LoopbackHub,
    settings: SimulationSettings,
    rooms: Vec<HostedRoom>,
    started_at: Instant,
    lobby_stats: Option<Timer>,
}

impl SimulationHost {
    pub fn new(hub: LoopbackHub, settings: SimulationSettings) -> Self {
        let now = Instant::now();
        let lobby_stats = settings
            .lobby_stats_interval()
            .map(|interval| Timer::new(interval, now));

        Self {
            hub,
            settings,
            rooms: Vec::new(),
            started_at: now,
            lobby_stats,
        }
    }

    /// Open every configured room with its seated hosts
    pub fn setup(&mut self) -> Result<()> {
        for config in self.settings.rooms.clone() {
            let room = self.open_room(config)?;
            info!(
                "Opened simulated room {} ({}/{} seated)",
                room.config.name, room.config.seated, room.config.max_players
            );
            self.rooms.push(room);
        }
        self.started_at = Instant::now();
        Ok(())
    }

    fn open_room(&self, config: SimulatedRoom) -> Result<HostedRoom> {
        let mut hosts = Vec::new();
        let mut host_actor_ids = Vec::new();

        // Actor ids are handed out in join order starting at 1
        let mut state = GameState::empty(config.max_players);
        for seat in 1..=config.seated {
            let actor_id = ActorId::from(seat);
            state.occupy_seat(seat as usize, json!(actor_id));
            state.already_acted.push(actor_id.to_string());
        }

        for index in 0..config.seated {
            let mut host = self
                .hub
                .register_client(&format!("{}-host-{}", config.name, index));
            if index == 0 {
                host.create_room(
                    &config.name,
                    RoomOptions {
                        max_players: config.max_players,
                        is_open: true,
                        properties: state.to_properties()?,
                    },
                )?;
            } else {
                host.join_lobby()?;
                host.join_room(&config.name)?;
            }
            let actor_id = host.local_actor_id().ok_or_else(|| SwarmError::InternalError {
                message: format!("host {} of {} was not admitted", index, config.name),
            })?;
            host_actor_ids.push(actor_id);
            hosts.push(host);
        }

        // Discard the setup chatter
        for host in hosts.iter_mut() {
            while host.poll_incoming().is_some() {}
        }

        Ok(HostedRoom {
            activity: RoomActivity {
                room_name: config.name.clone(),
                ..RoomActivity::default()
            },
            config,
            hosts,
            host_actor_ids,
            state,
        })
    }

    pub fn activity(&self) -> Vec<RoomActivity> {
        self.rooms.iter().map(|room| room.activity.clone()).collect()
    }

    /// Current `gameState` as the authority sees it
    pub fn game_state(&self, room_name: &str) -> Option<&GameState> {
        self.rooms
            .iter()
            .find(|room| room.config.name == room_name)
            .map(|room| &room.state)
    }

    /// Start rooms whose kickoff delay has passed
    pub fn kickoff_due(&mut self, now: Instant) {
        if now.duration_since(self.started_at) < self.settings.kickoff_delay() {
            return;
        }
        for room in self.rooms.iter_mut().filter(|room| !room.activity.kicked_off) {
            if let Err(e) = room.kickoff() {
                warn!("Kickoff of {} failed: {:#}", room.config.name, e);
            }
        }
    }

    pub fn publish_lobby_stats(&self) {
        match self.hub.publish_lobby_stats() {
            Ok(count) => debug!("Published lobby stats to {} client(s)", count),
            Err(e) => warn!("Failed to publish lobby stats: {:#}", e),
        }
    }

    /// Drive the hosts until `stop` resolves, then hand them back
    pub async fn run_until<F: Future<Output = ()>>(mut self, config: &SchedulerConfig, stop: F) -> Self {
        self.publish_lobby_stats();
        let mut scheduler = Scheduler::new(config, Instant::now());
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = sleep(scheduler.quantum()) => {
                    scheduler.tick(Instant::now(), &mut self);
                }
            }
        }

        info!("Simulation host stopped after {} ticks", scheduler.ticks());
        self
    }
}

impl ScheduledClient for SimulationHost {
    fn dispatch_incoming(&mut self) {
        for room in self.rooms.iter_mut() {
            let mut events = Vec::new();
            for (index, host) in room.hosts.iter_mut().enumerate() {
                while let Some(incoming) = host.poll_incoming() {
                    if let (0, Incoming::Event(event)) = (index, incoming) {
                        events.push(event);
                    }
                }
            }
            for event in &events {
                if let Err(e) = room.apply(event) {
                    warn!(
                        "Host of {} dropped event {}: {:#}",
                        room.config.name, event.code, e
                    );
                }
            }
        }
    }

    fn flush_outgoing(&mut self) {
        for room in self.rooms.iter_mut() {
            for host in room.hosts.iter_mut() {
                if let Err(e) = host.flush_outgoing() {
                    warn!("Host of {} failed to flush: {:#}", room.config.name, e);
                }
            }
        }
    }

    fn idle_action(&mut self) {
        let now = Instant::now();
        self.kickoff_due(now);
        let publish = self
            .lobby_stats
            .as_mut()
            .map_or(false, |timer| timer.poll(now));
        if publish {
            self.publish_lobby_stats();
        }
    }

    fn notify_observer(&mut self) {
        for activity in self.activity() {
            debug!("Simulated room activity: {:?}", activity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EventCode, SeatChange};

    fn settings(seated: u8, kickoff_delay_ms: u64) -> SimulationSettings {
        SimulationSettings {
            enabled: true,
            kickoff_delay_ms,
            rooms: vec![SimulatedRoom {
                name: "sim".to_string(),
                max_players: 4,
                seated,
            }],
            ..SimulationSettings::default()
        }
    }

    #[test]
    fn test_setup_seats_hosts() {
        let hub = LoopbackHub::new();
        let mut host = SimulationHost::new(hub.clone(), settings(2, 0));
        host.setup().unwrap();

        let info = &hub.room_infos()[0];
        assert_eq!(info.player_count, 2);
        assert_eq!(info.free_capacity(), 2);

        let state = host.game_state("sim").unwrap();
        assert!(!state.is_seat_free(1));
        assert!(!state.is_seat_free(2));
        assert!(state.is_seat_free(3));
        assert_eq!(state.already_acted, vec!["1", "2"]);
    }

    #[test]
    fn test_authority_records_claims() {
        let hub = LoopbackHub::new();
        let mut host = SimulationHost::new(hub.clone(), settings(1, 0));
        host.setup().unwrap();

        let mut bot = hub.register_client("bot");
        bot.join_lobby().unwrap();
        bot.join_room("sim").unwrap();
        bot.raise_event(
            BotEvent::TakeSeat(SeatChange::claim(3))
                .to_outgoing(true, ReceiverGroup::All)
                .unwrap(),
        )
        .unwrap();
        bot.flush_outgoing().unwrap();

        host.dispatch_incoming();

        assert_eq!(host.activity()[0].seats_claimed, 1);
        let room = hub.room_snapshot("sim").unwrap();
        let state = GameState::from_room(&room).unwrap();
        assert_eq!(state.seats[3], json!(2));
    }

    #[test]
    fn test_kickoff_waits_for_a_bot() {
        let hub = LoopbackHub::new();
        let mut host = SimulationHost::new(hub.clone(), settings(1, 0));
        host.setup().unwrap();

        host.kickoff_due(Instant::now());
        assert!(!host.activity()[0].kicked_off);

        let mut bot = hub.register_client("bot");
        bot.join_lobby().unwrap();
        bot.join_room("sim").unwrap();
        host.kickoff_due(Instant::now());
        assert!(host.activity()[0].kicked_off);

        let codes: Vec<u8> = hub.events_in("sim").iter().map(|e| e.code).collect();
        assert!(codes.contains(&EventCode::StartChoosingRole.as_u8()));
        assert!(codes.contains(&EventCode::UpdateCurrentTurn.as_u8()));
        let token = hub
            .events_in("sim")
            .into_iter()
            .find(|e| e.code == EventCode::UpdateCurrentActor.as_u8())
            .unwrap();
        assert_eq!(token.payload["actorNr"], json!(2));
    }

    #[test]
    fn test_kickoff_respects_delay() {
        let hub = LoopbackHub::new();
        let mut host = SimulationHost::new(hub.clone(), settings(1, 60_000));
        host.setup().unwrap();
        let mut bot = hub.register_client("bot");
        bot.join_lobby().unwrap();
        bot.join_room("sim").unwrap();

        host.kickoff_due(Instant::now());
        assert!(!host.activity()[0].kicked_off);
    }
}
