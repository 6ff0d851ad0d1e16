//! In-process game service
//!
//! `LoopbackHub` keeps a room directory, room membership and an event bus
//! behind one mutex. Every client handle registered on the hub gets its own
//! inbox; raised events sit in the handle's outbox until it is flushed.
//! Delivery is always reliable and ordered.

use super::{ConnectRequest, GameClient, Incoming, ServiceConnector};
use crate::error::{Result, SwarmError};
use crate::protocol::{EventCode, OutgoingEvent, RawEvent};
use crate::types::{
    Actor, ActorId, ClientState, PropertyMap, ReceiverGroup, Room, RoomInfo, RoomOptions,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

type ClientId = u64;

struct ClientRecord {
    nickname: String,
    state: ClientState,
    inbox: VecDeque<Incoming>,
    room: Option<String>,
    actor_id: Option<ActorId>,
}

struct Member {
    client_id: ClientId,
    name: String,
    properties: PropertyMap,
}

struct RoomRecord {
    max_players: u8,
    is_open: bool,
    properties: PropertyMap,
    members: BTreeMap<ActorId, Member>,
    next_actor_id: ActorId,
}

impl RoomRecord {
    fn info(&self, name: &str) -> RoomInfo {
        RoomInfo {
            name: name.to_string(),
            max_players: self.max_players,
            player_count: self.members.len().min(u8::MAX as usize) as u8,
            is_open: self.is_open,
            removed: false,
        }
    }
}

#[derive(Default)]
struct HubState {
    next_client_id: ClientId,
    clients: HashMap<ClientId, ClientRecord>,
    rooms: BTreeMap<String, RoomRecord>,
    /// Every event accepted by the bus, once, keyed by room
    event_log: Vec<(String, RawEvent)>,
}

impl HubState {
    fn client(&self, client_id: ClientId) -> Result<&ClientRecord> {
        self.clients
            .get(&client_id)
            .ok_or_else(|| SwarmError::ConnectionFailed {
                message: format!("client {} is not registered", client_id),
            })
            .map_err(Into::into)
    }

    fn client_mut(&mut self, client_id: ClientId) -> Result<&mut ClientRecord> {
        self.clients
            .get_mut(&client_id)
            .ok_or_else(|| SwarmError::ConnectionFailed {
                message: format!("client {} is not registered", client_id),
            })
            .map_err(Into::into)
    }

    fn push(&mut self, client_id: ClientId, incoming: Incoming) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.inbox.push_back(incoming);
        }
    }

    fn room_infos(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .map(|(name, room)| room.info(name))
            .collect()
    }

    fn lobby_clients(&self) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|(_, client)| client.state == ClientState::JoinedLobby)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Tell everyone in the lobby that a room changed
    fn announce_room(&mut self, name: &str) {
        let info = match self.rooms.get(name) {
            Some(room) => room.info(name),
            None => RoomInfo {
                name: name.to_string(),
                max_players: 0,
                player_count: 0,
                is_open: false,
                removed: true,
            },
        };

        for client_id in self.lobby_clients() {
            self.push(client_id, Incoming::RoomListUpdate(vec![info.clone()]));
        }
    }

    /// Fan an event out to the members selected by its receiver group
    fn deliver(&mut self, room_name: &str, event: RawEvent) -> Result<()> {
        let room = self
            .rooms
            .get(room_name)
            .ok_or_else(|| SwarmError::RoomNotFound {
                room: room_name.to_string(),
            })?;

        let recipients: Vec<ClientId> = room
            .members
            .iter()
            .filter(|(actor_id, _)| match event.receivers {
                ReceiverGroup::All => true,
                ReceiverGroup::Others => Some(**actor_id) != event.sender,
                ReceiverGroup::Actor(target) => **actor_id == target,
            })
            .map(|(_, member)| member.client_id)
            .collect();

        for client_id in recipients {
            self.push(client_id, Incoming::Event(event.clone()));
        }
        self.event_log.push((room_name.to_string(), event));
        Ok(())
    }

    fn service_event(code: EventCode, sender: ActorId, payload: Value) -> RawEvent {
        RawEvent {
            code: code.as_u8(),
            payload,
            sender: Some(sender),
            reliable: true,
            receivers: ReceiverGroup::All,
        }
    }

    fn admit(&mut self, client_id: ClientId, room_name: &str) -> Result<()> {
        let nickname = self.client(client_id)?.nickname.clone();
        let room = self
            .rooms
            .get_mut(room_name)
            .ok_or_else(|| SwarmError::RoomNotFound {
                room: room_name.to_string(),
            })?;

        let actor_id = room.next_actor_id;
        room.next_actor_id += 1;
        room.members.insert(
            actor_id,
            Member {
                client_id,
                name: nickname.clone(),
                properties: PropertyMap::new(),
            },
        );

        let client = self.client_mut(client_id)?;
        client.room = Some(room_name.to_string());
        client.actor_id = Some(actor_id);
        client.state = ClientState::Joined;
        self.push(client_id, Incoming::StatusChanged(ClientState::Joined));

        debug!("{} joined {} as actor {}", nickname, room_name, actor_id);
        self.deliver(
            room_name,
            Self::service_event(EventCode::Join, actor_id, json!({ "name": nickname })),
        )?;
        self.announce_room(room_name);
        Ok(())
    }

    /// Drop a client's membership, notifying the remaining members
    fn remove_member(&mut self, client_id: ClientId) -> Result<()> {
        let (room_name, actor_id) = {
            let client = self.client_mut(client_id)?;
            let room_name = client.room.take();
            let actor_id = client.actor_id.take();
            match (room_name, actor_id) {
                (Some(room), Some(actor)) => (room, actor),
                _ => return Ok(()),
            }
        };

        let now_empty = match self.rooms.get_mut(&room_name) {
            Some(room) => {
                room.members.remove(&actor_id);
                room.members.is_empty()
            }
            None => return Ok(()),
        };

        if now_empty {
            self.rooms.remove(&room_name);
            info!("Room {} closed after its last member left", room_name);
        } else {
            self.deliver(
                &room_name,
                Self::service_event(EventCode::Leave, actor_id, Value::Null),
            )?;
        }
        self.announce_room(&room_name);
        Ok(())
    }

    fn membership(&self, client_id: ClientId) -> Result<(String, ActorId)> {
        let client = self.client(client_id)?;
        match (&client.room, client.actor_id) {
            (Some(room), Some(actor)) => Ok((room.clone(), actor)),
            _ => Err(SwarmError::NotInRoom.into()),
        }
    }
}

/// Shared handle to an in-process game service
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HubState>> {
        self.state.lock().map_err(|_| {
            SwarmError::InternalError {
                message: "loopback hub lock poisoned".to_string(),
            }
            .into()
        })
    }

    /// Register a new connection; it starts connected to the master server
    pub fn register_client(&self, nickname: &str) -> LoopbackClient {
        let mut client_id = 0;
        if let Ok(mut state) = self.lock() {
            state.next_client_id += 1;
            client_id = state.next_client_id;
            let mut inbox = VecDeque::new();
            inbox.push_back(Incoming::StatusChanged(ClientState::ConnectedToMaster));
            state.clients.insert(
                client_id,
                ClientRecord {
                    nickname: nickname.to_string(),
                    state: ClientState::ConnectedToMaster,
                    inbox,
                    room: None,
                    actor_id: None,
                },
            );
        }

        LoopbackClient {
            hub: self.clone(),
            client_id,
            outbox: Vec::new(),
        }
    }

    pub fn room_infos(&self) -> Vec<RoomInfo> {
        self.lock().map(|state| state.room_infos()).unwrap_or_default()
    }

    /// Room as an outside observer sees it; no actor is local
    pub fn room_snapshot(&self, name: &str) -> Option<Room> {
        let state = self.lock().ok()?;
        state.rooms.get(name).map(|room| snapshot(name, room, None))
    }

    /// Events accepted for a room, in send order
    pub fn events_in(&self, room_name: &str) -> Vec<RawEvent> {
        self.lock()
            .map(|state| {
                state
                    .event_log
                    .iter()
                    .filter(|(room, _)| room == room_name)
                    .map(|(_, event)| event.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Send the full room directory to every client in the lobby
    pub fn publish_lobby_stats(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let infos = state.room_infos();
        let lobby = state.lobby_clients();
        for client_id in &lobby {
            state.push(*client_id, Incoming::LobbyStats(infos.clone()));
        }
        Ok(lobby.len())
    }

    /// Cut a member's connection as if the transport dropped
    pub fn disconnect_actor(&self, room_name: &str, actor_id: ActorId, cause: &str) -> Result<()> {
        let mut state = self.lock()?;
        let client_id = state
            .rooms
            .get(room_name)
            .and_then(|room| room.members.get(&actor_id))
            .map(|member| member.client_id)
            .ok_or(SwarmError::UnknownActor { actor_id })?;

        state.remove_member(client_id)?;
        let client = state.client_mut(client_id)?;
        client.state = ClientState::Disconnected;
        client.inbox.push_back(Incoming::Disconnected {
            cause: cause.to_string(),
        });
        Ok(())
    }

    pub fn client_count(&self) -> usize {
        self.lock().map(|state| state.clients.len()).unwrap_or(0)
    }
}

fn snapshot(name: &str, room: &RoomRecord, local: Option<ClientId>) -> Room {
    let players = room
        .members
        .iter()
        .map(|(actor_id, member)| {
            (
                *actor_id,
                Actor {
                    id: *actor_id,
                    name: member.name.clone(),
                    is_local: Some(member.client_id) == local,
                    is_active: true,
                    properties: member.properties.clone(),
                },
            )
        })
        .collect();

    Room {
        name: name.to_string(),
        max_players: room.max_players,
        is_open: room.is_open,
        players,
        properties: room.properties.clone(),
    }
}

/// Client handle registered on a `LoopbackHub`
pub struct LoopbackClient {
    hub: LoopbackHub,
    client_id: ClientId,
    outbox: Vec<OutgoingEvent>,
}

impl LoopbackClient {
    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }

    /// Queued events not yet flushed
    pub fn pending_outgoing(&self) -> usize {
        self.outbox.len()
    }
}

impl GameClient for LoopbackClient {
    fn state(&self) -> ClientState {
        self.hub
            .lock()
            .ok()
            .and_then(|state| state.clients.get(&self.client_id).map(|c| c.state))
            .unwrap_or(ClientState::Disconnected)
    }

    fn local_actor_id(&self) -> Option<ActorId> {
        let state = self.hub.lock().ok()?;
        state.clients.get(&self.client_id)?.actor_id
    }

    fn join_lobby(&mut self) -> Result<()> {
        let mut state = self.hub.lock()?;
        let infos = state.room_infos();
        let client = state.client_mut(self.client_id)?;

        match client.state {
            ClientState::ConnectedToMaster | ClientState::JoinedLobby => {}
            other => return Err(SwarmError::NotReadyToJoin { state: other }.into()),
        }

        client.state = ClientState::JoinedLobby;
        client
            .inbox
            .push_back(Incoming::StatusChanged(ClientState::JoinedLobby));
        client.inbox.push_back(Incoming::RoomListUpdate(infos));
        Ok(())
    }

    fn create_room(&mut self, name: &str, options: RoomOptions) -> Result<()> {
        let mut state = self.hub.lock()?;
        let current = state.client(self.client_id)?.state;
        if !matches!(
            current,
            ClientState::ConnectedToMaster | ClientState::JoinedLobby
        ) {
            return Err(SwarmError::NotReadyToJoin { state: current }.into());
        }

        if state.rooms.contains_key(name) {
            state.push(
                self.client_id,
                Incoming::JoinFailed {
                    room: name.to_string(),
                    reason: "room already exists".to_string(),
                },
            );
            return Ok(());
        }

        state.rooms.insert(
            name.to_string(),
            RoomRecord {
                max_players: options.max_players,
                is_open: options.is_open,
                properties: options.properties,
                members: BTreeMap::new(),
                next_actor_id: 1,
            },
        );
        info!("Created room {} for {} players", name, options.max_players);
        state.admit(self.client_id, name)
    }

    fn join_room(&mut self, name: &str) -> Result<()> {
        let mut state = self.hub.lock()?;
        let current = state.client(self.client_id)?.state;
        if !current.is_ready_to_join() {
            return Err(SwarmError::NotReadyToJoin { state: current }.into());
        }

        let refusal = match state.rooms.get(name) {
            None => Some(
                SwarmError::RoomNotFound {
                    room: name.to_string(),
                }
                .to_string(),
            ),
            Some(room) if !room.is_open => Some(
                SwarmError::RoomClosed {
                    room: name.to_string(),
                }
                .to_string(),
            ),
            Some(room) if room.members.len() >= room.max_players as usize => Some(
                SwarmError::RoomFull {
                    room: name.to_string(),
                }
                .to_string(),
            ),
            Some(_) => None,
        };

        if let Some(reason) = refusal {
            state.push(
                self.client_id,
                Incoming::JoinFailed {
                    room: name.to_string(),
                    reason,
                },
            );
            return Ok(());
        }

        state.admit(self.client_id, name)
    }

    fn leave_room(&mut self) -> Result<()> {
        let mut state = self.hub.lock()?;
        state.membership(self.client_id)?;
        state.remove_member(self.client_id)?;

        let client = state.client_mut(self.client_id)?;
        client.state = ClientState::JoinedLobby;
        client
            .inbox
            .push_back(Incoming::StatusChanged(ClientState::JoinedLobby));
        Ok(())
    }

    fn set_room_properties(&mut self, properties: PropertyMap) -> Result<()> {
        let mut state = self.hub.lock()?;
        let (room_name, actor_id) = state.membership(self.client_id)?;

        if let Some(room) = state.rooms.get_mut(&room_name) {
            for (key, value) in properties.iter() {
                room.properties.insert(key.clone(), value.clone());
            }
        }

        state.deliver(
            &room_name,
            HubState::service_event(
                EventCode::PropertiesChanged,
                actor_id,
                Value::Object(properties),
            ),
        )
    }

    fn set_actor_properties(&mut self, actor_id: ActorId, properties: PropertyMap) -> Result<()> {
        let mut state = self.hub.lock()?;
        let (room_name, sender) = state.membership(self.client_id)?;

        let member = state
            .rooms
            .get_mut(&room_name)
            .and_then(|room| room.members.get_mut(&actor_id))
            .ok_or(SwarmError::UnknownActor { actor_id })?;
        for (key, value) in properties.iter() {
            member.properties.insert(key.clone(), value.clone());
        }

        state.deliver(
            &room_name,
            HubState::service_event(
                EventCode::PropertiesChanged,
                sender,
                json!({ "actorNr": actor_id, "properties": properties }),
            ),
        )
    }

    fn raise_event(&mut self, event: OutgoingEvent) -> Result<()> {
        if self.state() == ClientState::Disconnected {
            return Err(SwarmError::ConnectionFailed {
                message: "client is disconnected".to_string(),
            }
            .into());
        }
        self.outbox.push(event);
        Ok(())
    }

    fn poll_incoming(&mut self) -> Option<Incoming> {
        let mut state = self.hub.lock().ok()?;
        state.clients.get_mut(&self.client_id)?.inbox.pop_front()
    }

    fn flush_outgoing(&mut self) -> Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.outbox);
        let mut state = self.hub.lock()?;
        let (room_name, actor_id) = match state.membership(self.client_id) {
            Ok(membership) => membership,
            Err(e) => {
                warn!("Dropping {} queued events: {}", pending.len(), e);
                return Err(e);
            }
        };

        for event in pending {
            state.deliver(&room_name, event.into_raw(Some(actor_id)))?;
        }
        Ok(())
    }

    fn current_room(&self) -> Option<Room> {
        let state = self.hub.lock().ok()?;
        let room_name = state.clients.get(&self.client_id)?.room.clone()?;
        state
            .rooms
            .get(&room_name)
            .map(|room| snapshot(&room_name, room, Some(self.client_id)))
    }
}

impl Drop for LoopbackClient {
    fn drop(&mut self) {
        if let Ok(mut state) = self.hub.lock() {
            if let Err(e) = state.remove_member(self.client_id) {
                debug!("Cleanup of client {} failed: {}", self.client_id, e);
            }
            state.clients.remove(&self.client_id);
        }
    }
}

/// Connector handing out loopback clients, optionally refusing the first
/// few attempts
pub struct LoopbackConnector {
    hub: LoopbackHub,
    refusals_left: AtomicU32,
}

impl LoopbackConnector {
    pub fn new(hub: LoopbackHub) -> Self {
        Self {
            hub,
            refusals_left: AtomicU32::new(0),
        }
    }

    /// Refuse the next `count` connection attempts
    pub fn with_refusals(hub: LoopbackHub, count: u32) -> Self {
        Self {
            hub,
            refusals_left: AtomicU32::new(count),
        }
    }

    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }
}

#[async_trait]
impl ServiceConnector for LoopbackConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn GameClient>> {
        let refused = self
            .refusals_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if refused {
            return Err(SwarmError::ConnectionFailed {
                message: format!("{} refused connection", request.address),
            }
            .into());
        }

        Ok(Box::new(self.hub.register_client(&request.nickname)))
    }
}
