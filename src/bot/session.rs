//! Bot session
//!
//! A session owns one connection handle and reacts to everything the
//! service delivers on it: connection status, room membership, player info
//! and the seat/role/turn control events. Handler failures are caught per
//! event at the dispatch boundary so one bad event never stops the loop.

use crate::bot::allocation::{free_seat_pool, role_for, seat_for, select_role_slot, RoomSharedState};
use crate::bot::observer::{SessionObserver, SessionSnapshot};
use crate::bot::player::{LocalPlayer, Player};
use crate::bot::probe::RoundTripProbe;
use crate::bot::rotation::forward_token;
use crate::bot::scheduler::{ScheduledClient, Scheduler};
use crate::client::{GameClient, Incoming};
use crate::config::{BotSettings, SchedulerConfig};
use crate::error::{Result, SwarmError};
use crate::metrics::MetricsCollector;
use crate::protocol::{
    ActorUpdate, BotEvent, EventCode, GameState, RawEvent, RoleChange, SeatChange, TurnUpdate,
    ACTION_VOTING,
};
use crate::types::{ActorId, ClientState, PropertyMap, ReceiverGroup, Room};
use crate::utils::{as_millis_f64, current_timestamp};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Where a spawned bot belongs
#[derive(Debug, Clone)]
pub struct BotAssignment {
    pub room_name: String,
    /// 0-based, distinct within the batch
    pub sequence_id: usize,
    pub shared: Arc<RoomSharedState>,
}

/// Per-session behaviour switches
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub nickname_prefix: String,
    pub reliable_position: bool,
    pub probe_on_notify: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&BotSettings::default())
    }
}

impl From<&BotSettings> for SessionSettings {
    fn from(settings: &BotSettings) -> Self {
        Self {
            nickname_prefix: settings.nickname_prefix.clone(),
            reliable_position: settings.reliable_position,
            probe_on_notify: settings.probe_on_notify,
        }
    }
}

pub struct BotSession {
    client: Box<dyn GameClient>,
    assignment: BotAssignment,
    settings: SessionSettings,
    local: LocalPlayer,
    /// Remote players in the current room
    roster: BTreeMap<ActorId, Player>,
    probe: RoundTripProbe,
    rng: StdRng,
    metrics: Arc<MetricsCollector>,
    observer: Option<Arc<dyn SessionObserver>>,
    join_requested: bool,
    events_handled: u64,
    handler_errors: u64,
}

impl BotSession {
    pub fn new(
        client: Box<dyn GameClient>,
        assignment: BotAssignment,
        settings: SessionSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self::with_rng(client, assignment, settings, metrics, StdRng::from_entropy())
    }

    /// Build a session with a fixed random source
    pub fn with_rng(
        client: Box<dyn GameClient>,
        assignment: BotAssignment,
        settings: SessionSettings,
        metrics: Arc<MetricsCollector>,
        mut rng: StdRng,
    ) -> Self {
        let local = LocalPlayer::new(&settings.nickname_prefix, assignment.sequence_id, &mut rng);
        Self {
            client,
            assignment,
            settings,
            local,
            roster: BTreeMap::new(),
            probe: RoundTripProbe::new(),
            rng,
            metrics,
            observer: None,
            join_requested: false,
            events_handled: 0,
            handler_errors: 0,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Drive the session forever on the per-session scheduler
    pub async fn run(mut self, config: &SchedulerConfig) {
        info!(
            "Session {} targeting room {} started",
            self.local.name(),
            self.assignment.room_name
        );
        Scheduler::new(config, Instant::now()).run(&mut self).await
    }

    pub fn state(&self) -> ClientState {
        self.client.state()
    }

    pub fn local(&self) -> &LocalPlayer {
        &self.local
    }

    pub fn assignment(&self) -> &BotAssignment {
        &self.assignment
    }

    pub fn roster(&self) -> &BTreeMap<ActorId, Player> {
        &self.roster
    }

    pub fn probe(&self) -> &RoundTripProbe {
        &self.probe
    }

    pub fn events_handled(&self) -> u64 {
        self.events_handled
    }

    pub fn handler_errors(&self) -> u64 {
        self.handler_errors
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            batch_id: self.assignment.shared.batch_id(),
            room_name: self.assignment.room_name.clone(),
            sequence_id: self.assignment.sequence_id,
            nickname: self.local.name().to_string(),
            actor_id: self.local.actor_id(),
            state: self.client.state(),
            seat: self.local.seat,
            role: self.local.role,
            position: self.local.player.position(),
            last_rtt_ms: self.probe.last_rtt().map(as_millis_f64),
            received_count_me: self.probe.received_count_me(),
            events_handled: self.events_handled,
            handler_errors: self.handler_errors,
            updated_at: current_timestamp(),
        }
    }

    /// Handle one notification; failures are logged and dropped here
    pub fn handle_incoming(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::StatusChanged(state) => self.on_status_changed(state),
            Incoming::Event(raw) => {
                self.events_handled += 1;
                if let Err(e) = self.handle_event(&raw) {
                    self.handler_errors += 1;
                    let label = EventCode::try_from(raw.code)
                        .map(EventCode::name)
                        .unwrap_or("other");
                    self.metrics.record_handler_error(label);
                    warn!(
                        "Dropping event {} from {:?}: {:#}",
                        raw.code, raw.sender, e
                    );
                }
            }
            Incoming::JoinFailed { room, reason } => {
                warn!("{} could not join {}: {}", self.local.name(), room, reason);
            }
            Incoming::Disconnected { cause } => {
                error!(
                    "{} caused a disconnect of {}. State: {}",
                    cause,
                    self.local.name(),
                    self.client.state()
                );
            }
            Incoming::RoomListUpdate(_) | Incoming::LobbyStats(_) => {
                trace!("{} ignores directory notification", self.local.name());
            }
        }
    }

    fn on_status_changed(&mut self, state: ClientState) {
        debug!("{} status changed to {}", self.local.name(), state);
        match state {
            ClientState::ConnectedToMaster => {
                if let Err(e) = self.client.join_lobby() {
                    warn!("{} failed to join the lobby: {:#}", self.local.name(), e);
                }
            }
            // Joining is only legal from the lobby, so the request waits until here
            ClientState::JoinedLobby if !self.join_requested => {
                self.join_requested = true;
                let room = self.assignment.room_name.clone();
                match self.client.join_room(&room) {
                    Ok(()) => info!("{} joining room {}", self.local.name(), room),
                    Err(e) => warn!("{} failed to join {}: {:#}", self.local.name(), room, e),
                }
            }
            ClientState::Joined => {
                info!(
                    "{} joined room {} as actor {:?}",
                    self.local.name(),
                    self.assignment.room_name,
                    self.client.local_actor_id()
                );
            }
            ClientState::Disconnected => {
                error!("{} disconnected", self.local.name());
            }
            _ => {}
        }
    }

    fn handle_event(&mut self, raw: &RawEvent) -> Result<()> {
        let event = BotEvent::decode(raw)?;
        self.metrics.record_event_received(event.name());

        match event {
            BotEvent::PlayerInfo(info) => {
                let sender = require_sender(raw)?;
                let player = self
                    .roster
                    .get_mut(&sender)
                    .ok_or(SwarmError::UnknownActor { actor_id: sender })?;
                player.apply_info(&info);
            }
            BotEvent::PlayerMove(movement) => {
                let sender = require_sender(raw)?;
                let player = self
                    .roster
                    .get_mut(&sender)
                    .ok_or(SwarmError::UnknownActor { actor_id: sender })?;
                player.apply_move(&movement);
            }
            BotEvent::CountMe => {
                let from_local =
                    raw.sender.is_some() && raw.sender == self.client.local_actor_id();
                if let Some(rtt) = self.probe.on_count_me(from_local, Instant::now()) {
                    info!("{} RTT: {:.2}ms", self.local.name(), as_millis_f64(rtt));
                    self.metrics.record_round_trip(rtt);
                }
            }
            BotEvent::Join => self.on_join(require_sender(raw)?)?,
            BotEvent::Leave => {
                let sender = require_sender(raw)?;
                if self.roster.remove(&sender).is_some() {
                    debug!("{} saw actor {} leave", self.local.name(), sender);
                }
            }
            BotEvent::StartChoosingRole => self.choose_role()?,
            BotEvent::UpdateCurrentTurn(update) => self.on_turn_update(&update)?,
            BotEvent::UpdateCurrentActor(update) => self.on_actor_update(&update)?,
            BotEvent::TakeSeat(_)
            | BotEvent::ChooseRole(_)
            | BotEvent::VotingEnded
            | BotEvent::PropertiesChanged
            | BotEvent::AppStats
            | BotEvent::Other(_) => {
                trace!("{} ignores event {}", self.local.name(), raw.code);
            }
        }
        Ok(())
    }

    fn current_room(&self) -> Result<Room> {
        self.client
            .current_room()
            .ok_or_else(|| SwarmError::NotInRoom.into())
    }

    fn on_join(&mut self, sender: ActorId) -> Result<()> {
        let room = self.current_room()?;

        if Some(sender) == self.client.local_actor_id() {
            self.local.player.actor_id = Some(sender);
            self.roster = room
                .players
                .values()
                .filter(|actor| !actor.is_local)
                .map(|actor| (actor.id, Player::remote(actor.id, actor.name.clone())))
                .collect();

            let mut properties = PropertyMap::new();
            properties.insert("class".to_string(), json!(self.local.class));
            properties.insert("nickName".to_string(), json!(self.local.name()));
            self.client.set_actor_properties(sender, properties)?;

            self.send_player_info()?;
            return self.take_seat(&room);
        }

        let name = room
            .get_player(sender)
            .map(|actor| actor.name.clone())
            .unwrap_or_default();
        self.roster
            .entry(sender)
            .or_insert_with(|| Player::remote(sender, name));

        // The newcomer has not seen our info yet
        self.send_player_info()
    }

    fn take_seat(&mut self, room: &Room) -> Result<()> {
        let max_players = room.max_players;
        let sequence_id = self.assignment.sequence_id;

        let access = self.assignment.shared.seat_pool_or_publish(sequence_id, || {
            let state = GameState::from_room(room)?;
            Ok(free_seat_pool(&state, max_players))
        })?;
        if access.published_now {
            self.metrics.record_seat_pool_published();
        }

        if access.seats.is_empty() {
            info!("{} found no free seat in {}", self.local.name(), room.name);
            return Ok(());
        }

        match seat_for(&access.seats, sequence_id, max_players) {
            Some(seat) => {
                info!("TakeSeat: {} take {}", sequence_id, seat);
                self.local.seat = Some(seat);
                self.raise_control(BotEvent::TakeSeat(SeatChange::claim(seat)))?;
                self.metrics.record_seat_claimed();
            }
            None => {
                warn!(
                    "{} has sequence id {} beyond the {} published seats",
                    self.local.name(),
                    sequence_id,
                    access.seats.len()
                );
                self.metrics.record_seat_pool_exhausted();
            }
        }
        Ok(())
    }

    fn choose_role(&mut self) -> Result<()> {
        let room = self.current_room()?;
        let state = GameState::from_room(&room)?;
        let slot = select_role_slot(&state);
        let role = role_for(slot, self.assignment.sequence_id, room.max_players).ok_or_else(
            || SwarmError::InternalError {
                message: format!("room {} has no player slots", room.name),
            },
        )?;

        debug!(
            "{} picked role slot {} giving role {}",
            self.local.name(),
            slot,
            role
        );
        self.local.role = Some(role);
        self.raise_control(BotEvent::ChooseRole(RoleChange::claim(role)))?;
        self.metrics.record_role_claimed();
        Ok(())
    }

    fn on_turn_update(&mut self, update: &TurnUpdate) -> Result<()> {
        if update.action == ACTION_VOTING {
            self.raise_control(BotEvent::VotingEnded)?;
            self.metrics.record_voting_ended();
        }
        Ok(())
    }

    fn on_actor_update(&mut self, update: &ActorUpdate) -> Result<()> {
        let local_id = match self.client.local_actor_id() {
            Some(id) if id == update.actor_nr => id,
            _ => return Ok(()),
        };

        let room = self.current_room()?;
        let state = GameState::from_room(&room)?;
        match forward_token(update, local_id, &room, &state) {
            Some(next) => {
                info!(
                    "{} hands the turn token to actor {}",
                    self.local.name(),
                    next.actor_nr
                );
                self.raise_control(BotEvent::UpdateCurrentActor(next))?;
                self.metrics.record_token_forwarded();
            }
            None => {
                debug!("{} ends the turn token chain", self.local.name());
                self.metrics.record_token_chain_ended();
            }
        }
        Ok(())
    }

    fn raise(&mut self, event: BotEvent, reliable: bool, receivers: ReceiverGroup) -> Result<()> {
        let outgoing = event.to_outgoing(reliable, receivers)?;
        self.client.raise_event(outgoing)?;
        self.metrics.record_event_sent(event.name());
        Ok(())
    }

    /// Control events always go reliably to everyone, the sender included
    fn raise_control(&mut self, event: BotEvent) -> Result<()> {
        self.raise(event, true, ReceiverGroup::All)
    }

    pub fn send_player_info(&mut self) -> Result<()> {
        if self.local.actor_id().is_none() {
            return Ok(());
        }
        let info = self.local.player.info_payload();
        self.raise(BotEvent::PlayerInfo(info), true, ReceiverGroup::Others)
    }

    pub fn send_position(&mut self) -> Result<()> {
        if self.local.actor_id().is_none() {
            return Ok(());
        }
        let movement = self.local.player.move_payload();
        self.raise(
            BotEvent::PlayerMove(movement),
            self.settings.reliable_position,
            ReceiverGroup::Others,
        )
    }

    /// Raise a probe, flush it right away and start timing.
    /// A probe still in flight is discarded.
    pub fn start_probe(&mut self) -> Result<()> {
        if !self.client.state().is_in_room() {
            return Err(SwarmError::NotInRoom.into());
        }

        self.raise(BotEvent::CountMe, false, ReceiverGroup::All)?;
        self.client.flush_outgoing()?;
        if self.probe.start(Instant::now()) {
            debug!("{} discarded an unanswered probe", self.local.name());
            self.metrics.record_probe_overwritten();
        }
        Ok(())
    }
}

fn require_sender(raw: &RawEvent) -> Result<ActorId> {
    raw.sender.ok_or_else(|| {
        SwarmError::InvalidPayload {
            code: raw.code,
            reason: "event carries no sender".to_string(),
        }
        .into()
    })
}

impl ScheduledClient for BotSession {
    fn dispatch_incoming(&mut self) {
        while let Some(incoming) = self.client.poll_incoming() {
            self.handle_incoming(incoming);
        }
    }

    fn flush_outgoing(&mut self) {
        if let Err(e) = self.client.flush_outgoing() {
            warn!("{} failed to flush: {:#}", self.local.name(), e);
        }
    }

    fn idle_action(&mut self) {
        if self.client.state() != ClientState::Joined {
            return;
        }
        self.local.player.random_walk(&mut self.rng);
        if let Err(e) = self.send_position() {
            warn!("{} failed to send position: {:#}", self.local.name(), e);
        }
    }

    fn notify_observer(&mut self) {
        if self.settings.probe_on_notify && self.client.state().is_in_room() {
            if let Err(e) = self.start_probe() {
                debug!("{} skipped probe: {:#}", self.local.name(), e);
            }
        }
        if let Some(observer) = &self.observer {
            observer.on_update(&self.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LoopbackClient, LoopbackHub};
    use crate::protocol::{ACTION_AUTHING, GameState};
    use crate::types::{RoomOptions, GAME_STATE_KEY};
    use serde_json::Value;

    fn metrics() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().unwrap())
    }

    fn host_room(hub: &LoopbackHub, name: &str, max_players: u8, state: &GameState) -> LoopbackClient {
        let mut host = hub.register_client("host");
        host.create_room(
            name,
            RoomOptions {
                max_players,
                is_open: true,
                properties: state.to_properties().unwrap(),
            },
        )
        .unwrap();
        while host.poll_incoming().is_some() {}
        host
    }

    fn session(hub: &LoopbackHub, shared: &Arc<RoomSharedState>, sequence_id: usize) -> BotSession {
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
            StdRng::seed_from_u64(sequence_id as u64),
        )
    }

    fn host_events(host: &mut LoopbackClient) -> Vec<RawEvent> {
        std::iter::from_fn(|| host.poll_incoming())
            .filter_map(|i| match i {
                Incoming::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn pump(session: &mut BotSession) {
        session.dispatch_incoming();
        session.flush_outgoing();
    }

    #[test]
    fn test_join_is_deferred_until_lobby() {
        let hub = LoopbackHub::new();
        let _host = host_room(&hub, "alpha", 4, &GameState::empty(4));
        let shared = Arc::new(RoomSharedState::new("alpha", 1));
        let mut bot = session(&hub, &shared, 0);

        assert_eq!(bot.state(), ClientState::ConnectedToMaster);
        bot.dispatch_incoming();
        assert_eq!(bot.state(), ClientState::Joined);
        assert_eq!(bot.local().actor_id(), Some(2));
        assert!(bot.roster().contains_key(&1));
    }

    #[test]
    fn test_local_join_claims_seat() {
        let hub = LoopbackHub::new();
        let mut state = GameState::empty(4);
        state.occupy_seat(1, json!(1));
        let mut host = host_room(&hub, "alpha", 4, &state);
        let shared = Arc::new(RoomSharedState::new("alpha", 3));
        let mut bot = session(&hub, &shared, 1);

        pump(&mut bot);

        assert_eq!(bot.local().seat, Some(3));
        assert_eq!(&*shared.published_seats().unwrap(), &[2, 3, 4]);

        let seat_events: Vec<RawEvent> = host_events(&mut host)
            .into_iter()
            .filter(|e| e.code == EventCode::TakeSeat.as_u8())
            .collect();
        assert_eq!(seat_events.len(), 1);
        assert_eq!(
            seat_events[0].payload,
            json!({"oldSeatNumber": -1, "newSeatNumber": 3})
        );
        assert!(seat_events[0].reliable);
    }

    #[test]
    fn test_missing_game_state_is_contained() {
        let hub = LoopbackHub::new();
        let mut host = hub.register_client("host");
        host.create_room(
            "bare",
            RoomOptions {
                max_players: 4,
                is_open: true,
                properties: PropertyMap::new(),
            },
        )
        .unwrap();
        let shared = Arc::new(RoomSharedState::new("bare", 1));
        let mut bot = session(&hub, &shared, 0);

        pump(&mut bot);

        assert_eq!(bot.state(), ClientState::Joined);
        assert_eq!(bot.handler_errors(), 1);
        assert!(shared.published_seats().is_none());
        assert_eq!(bot.local().seat, None);
    }

    #[test]
    fn test_voting_turn_triggers_voting_ended() {
        let hub = LoopbackHub::new();
        let mut host = host_room(&hub, "alpha", 4, &GameState::empty(4));
        let shared = Arc::new(RoomSharedState::new("alpha", 1));
        let mut bot = session(&hub, &shared, 0);
        pump(&mut bot);
        host_events(&mut host);

        host.raise_event(
            BotEvent::UpdateCurrentTurn(TurnUpdate {
                action: ACTION_VOTING.to_string(),
            })
            .to_outgoing(true, ReceiverGroup::All)
            .unwrap(),
        )
        .unwrap();
        host.raise_event(
            BotEvent::UpdateCurrentTurn(TurnUpdate {
                action: "isSpeaking".to_string(),
            })
            .to_outgoing(true, ReceiverGroup::All)
            .unwrap(),
        )
        .unwrap();
        host.flush_outgoing().unwrap();
        host_events(&mut host);

        pump(&mut bot);
        let voting_ended = host_events(&mut host)
            .into_iter()
            .filter(|e| e.code == EventCode::VotingEnded.as_u8())
            .count();
        assert_eq!(voting_ended, 1);
    }

    #[test]
    fn test_token_forwarding() {
        let hub = LoopbackHub::new();
        let mut state = GameState::empty(4);
        state.already_acted = vec!["1".to_string()];
        let mut host = host_room(&hub, "alpha", 4, &state);
        let shared = Arc::new(RoomSharedState::new("alpha", 2));
        let mut first = session(&hub, &shared, 0);
        pump(&mut first);
        let mut second = session(&hub, &shared, 1);
        pump(&mut second);
        host_events(&mut host);

        // Token addressed to actor 2 (the first bot) with actor 1 already done
        host.raise_event(
            BotEvent::UpdateCurrentActor(ActorUpdate::authing(2))
                .to_outgoing(true, ReceiverGroup::All)
                .unwrap(),
        )
        .unwrap();
        host.flush_outgoing().unwrap();
        host_events(&mut host);

        pump(&mut second);
        assert!(host_events(&mut host).is_empty());

        pump(&mut first);
        let forwarded: Vec<RawEvent> = host_events(&mut host)
            .into_iter()
            .filter(|e| e.code == EventCode::UpdateCurrentActor.as_u8())
            .collect();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].sender, Some(2));
        assert_eq!(forwarded[0].payload["actorNr"], json!(3));
        assert_eq!(forwarded[0].payload["action"], json!(ACTION_AUTHING));
        assert_eq!(forwarded[0].payload["updateOthers"], Value::Bool(false));
    }

    #[test]
    fn test_unknown_actor_move_is_dropped() {
        let hub = LoopbackHub::new();
        let _host = host_room(&hub, "alpha", 4, &GameState::empty(4));
        let shared = Arc::new(RoomSharedState::new("alpha", 1));
        let mut bot = session(&hub, &shared, 0);
        pump(&mut bot);

        let stray = RawEvent {
            code: EventCode::PlayerMove.as_u8(),
            payload: json!({"0": 1, "1": 2}),
            sender: Some(42),
            reliable: false,
            receivers: ReceiverGroup::Others,
        };
        let errors_before = bot.handler_errors();
        bot.handle_incoming(Incoming::Event(stray));
        assert_eq!(bot.handler_errors(), errors_before + 1);

        let known = RawEvent {
            code: EventCode::PlayerMove.as_u8(),
            payload: json!({"0": 1, "1": 2}),
            sender: Some(1),
            reliable: false,
            receivers: ReceiverGroup::Others,
        };
        bot.handle_incoming(Incoming::Event(known));
        assert_eq!(bot.roster()[&1].position(), (1, 2));
        assert_eq!(bot.handler_errors(), errors_before + 1);
    }

    #[test]
    fn test_probe_round_trip() {
        let hub = LoopbackHub::new();
        let _host = host_room(&hub, "alpha", 4, &GameState::empty(4));
        let shared = Arc::new(RoomSharedState::new("alpha", 1));
        let mut bot = session(&hub, &shared, 0);
        pump(&mut bot);

        bot.start_probe().unwrap();
        assert!(bot.probe().is_outstanding());
        bot.dispatch_incoming();

        assert!(!bot.probe().is_outstanding());
        assert!(bot.probe().last_rtt().is_some());
        assert_eq!(bot.probe().received_count_me(), 1);
    }

    #[test]
    fn test_probe_requires_room() {
        let hub = LoopbackHub::new();
        let shared = Arc::new(RoomSharedState::new("nowhere", 1));
        let mut bot = session(&hub, &shared, 0);
        assert!(bot.start_probe().is_err());
    }

    #[test]
    fn test_actor_properties_are_published() {
        let hub = LoopbackHub::new();
        let _host = host_room(&hub, "alpha", 4, &GameState::empty(4));
        let shared = Arc::new(RoomSharedState::new("alpha", 1));
        let mut bot = session(&hub, &shared, 0);
        pump(&mut bot);

        let room = hub.room_snapshot("alpha").unwrap();
        let properties = &room.get_player(2).unwrap().properties;
        assert_eq!(properties["nickName"], json!("Player_0"));
        assert!(properties["class"].as_str().unwrap().starts_with("tank"));
        assert!(room.properties.contains_key(GAME_STATE_KEY));
    }
}
