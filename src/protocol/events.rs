//! Event envelopes and typed payloads
//!
//! Events travel as a code plus a loosely typed JSON payload (`RawEvent`).
//! They are decoded exactly once, at the dispatch boundary, into `BotEvent`,
//! which carries one payload type per code.

use crate::error::SwarmError;
use crate::protocol::codes::EventCode;
use crate::types::{ActorId, ReceiverGroup, RoleId, SeatNumber};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Turn action announcing the voting phase
pub const ACTION_VOTING: &str = "isVoting";

/// Turn action handed along with the actor token
pub const ACTION_AUTHING: &str = "isAuthing";

/// Marker for "no previous seat/role" in claim events
pub const NO_PREVIOUS: i32 = -1;

/// An event as delivered by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub code: u8,
    pub payload: Value,
    /// Actor that raised the event; `None` for service-originated events
    pub sender: Option<ActorId>,
    pub reliable: bool,
    pub receivers: ReceiverGroup,
}

/// An event queued for sending; the service stamps the sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEvent {
    pub code: u8,
    pub payload: Value,
    pub reliable: bool,
    pub receivers: ReceiverGroup,
}

impl OutgoingEvent {
    /// Attach the sender as the service would on delivery
    pub fn into_raw(self, sender: Option<ActorId>) -> RawEvent {
        RawEvent {
            code: self.code,
            payload: self.payload,
            sender,
            reliable: self.reliable,
            receivers: self.receivers,
        }
    }
}

/// Nickname and color of a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfoPayload {
    #[serde(rename = "2")]
    pub name: String,
    #[serde(rename = "3")]
    pub color: i32,
}

/// Board position of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMovePayload {
    #[serde(rename = "0")]
    pub x: u8,
    #[serde(rename = "1")]
    pub y: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatChange {
    pub old_seat_number: i32,
    pub new_seat_number: SeatNumber,
}

impl SeatChange {
    /// Claim of a seat by someone who held none before
    pub fn claim(seat: SeatNumber) -> Self {
        Self {
            old_seat_number: NO_PREVIOUS,
            new_seat_number: seat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    pub old_role_id: i32,
    pub new_role_id: RoleId,
}

impl RoleChange {
    pub fn claim(role: RoleId) -> Self {
        Self {
            old_role_id: NO_PREVIOUS,
            new_role_id: role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnUpdate {
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorUpdate {
    #[serde(rename = "actorNr", deserialize_with = "deserialize_actor_nr")]
    pub actor_nr: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(
        rename = "updateOthers",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub update_others: Option<bool>,
}

impl ActorUpdate {
    /// Hand the actor token to `actor_nr` for authing
    pub fn authing(actor_nr: ActorId) -> Self {
        Self {
            actor_nr,
            action: Some(ACTION_AUTHING.to_string()),
            update_others: Some(false),
        }
    }
}

/// Actor numbers arrive as numbers from bots but as strings from some hosts
fn deserialize_actor_nr<'de, D>(deserializer: D) -> std::result::Result<ActorId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => ActorId::try_from(n).map_err(D::Error::custom),
        NumberOrString::String(s) => s.trim().parse().map_err(D::Error::custom),
    }
}

/// Decoded form of every event the swarm understands
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    PlayerInfo(PlayerInfoPayload),
    PlayerMove(PlayerMovePayload),
    CountMe,
    TakeSeat(SeatChange),
    StartChoosingRole,
    ChooseRole(RoleChange),
    VotingEnded,
    UpdateCurrentTurn(TurnUpdate),
    UpdateCurrentActor(ActorUpdate),
    Join,
    Leave,
    PropertiesChanged,
    AppStats,
    /// Codes this client has no handler for
    Other(u8),
}

/// Payload content of a probe; the echo is matched by sender, not content
const COUNT_ME_KEY: &str = "10";
const COUNT_ME_DATA: &str = "my data";

impl BotEvent {
    /// Decode a raw event; unknown codes become `Other`
    pub fn decode(raw: &RawEvent) -> std::result::Result<Self, SwarmError> {
        let code = match EventCode::try_from(raw.code) {
            Ok(code) => code,
            Err(other) => return Ok(BotEvent::Other(other)),
        };

        let event = match code {
            EventCode::PlayerInfo => BotEvent::PlayerInfo(parse_payload(raw)?),
            EventCode::PlayerMove => BotEvent::PlayerMove(parse_payload(raw)?),
            EventCode::CountMe => BotEvent::CountMe,
            EventCode::TakeSeat => BotEvent::TakeSeat(parse_payload(raw)?),
            EventCode::StartChoosingRole => BotEvent::StartChoosingRole,
            EventCode::ChooseRole => BotEvent::ChooseRole(parse_payload(raw)?),
            EventCode::VotingEnded => BotEvent::VotingEnded,
            EventCode::UpdateCurrentTurn => BotEvent::UpdateCurrentTurn(parse_payload(raw)?),
            EventCode::UpdateCurrentActor => BotEvent::UpdateCurrentActor(parse_payload(raw)?),
            EventCode::Join => BotEvent::Join,
            EventCode::Leave => BotEvent::Leave,
            EventCode::PropertiesChanged => BotEvent::PropertiesChanged,
            EventCode::AppStats => BotEvent::AppStats,
            // Directory notifications arrive through their own callbacks
            EventCode::LobbyStats | EventCode::GameListUpdate => BotEvent::Other(raw.code),
        };

        Ok(event)
    }

    /// Numeric code of this event
    pub fn code(&self) -> u8 {
        match self {
            BotEvent::PlayerInfo(_) => EventCode::PlayerInfo.as_u8(),
            BotEvent::PlayerMove(_) => EventCode::PlayerMove.as_u8(),
            BotEvent::CountMe => EventCode::CountMe.as_u8(),
            BotEvent::TakeSeat(_) => EventCode::TakeSeat.as_u8(),
            BotEvent::StartChoosingRole => EventCode::StartChoosingRole.as_u8(),
            BotEvent::ChooseRole(_) => EventCode::ChooseRole.as_u8(),
            BotEvent::VotingEnded => EventCode::VotingEnded.as_u8(),
            BotEvent::UpdateCurrentTurn(_) => EventCode::UpdateCurrentTurn.as_u8(),
            BotEvent::UpdateCurrentActor(_) => EventCode::UpdateCurrentActor.as_u8(),
            BotEvent::Join => EventCode::Join.as_u8(),
            BotEvent::Leave => EventCode::Leave.as_u8(),
            BotEvent::PropertiesChanged => EventCode::PropertiesChanged.as_u8(),
            BotEvent::AppStats => EventCode::AppStats.as_u8(),
            BotEvent::Other(code) => *code,
        }
    }

    /// Wire payload of this event
    pub fn payload(&self) -> std::result::Result<Value, SwarmError> {
        let value = match self {
            BotEvent::PlayerInfo(p) => to_value(self.code(), p)?,
            BotEvent::PlayerMove(p) => to_value(self.code(), p)?,
            BotEvent::CountMe => serde_json::json!({ COUNT_ME_KEY: COUNT_ME_DATA }),
            BotEvent::TakeSeat(p) => to_value(self.code(), p)?,
            BotEvent::ChooseRole(p) => to_value(self.code(), p)?,
            BotEvent::VotingEnded => Value::String(String::new()),
            BotEvent::UpdateCurrentTurn(p) => to_value(self.code(), p)?,
            BotEvent::UpdateCurrentActor(p) => to_value(self.code(), p)?,
            BotEvent::StartChoosingRole
            | BotEvent::Join
            | BotEvent::Leave
            | BotEvent::PropertiesChanged
            | BotEvent::AppStats
            | BotEvent::Other(_) => Value::Null,
        };
        Ok(value)
    }

    /// Build the outgoing envelope for this event
    pub fn to_outgoing(
        &self,
        reliable: bool,
        receivers: ReceiverGroup,
    ) -> std::result::Result<OutgoingEvent, SwarmError> {
        Ok(OutgoingEvent {
            code: self.code(),
            payload: self.payload()?,
            reliable,
            receivers,
        })
    }

    /// Label used for metrics and log lines
    pub fn name(&self) -> &'static str {
        EventCode::try_from(self.code())
            .map(EventCode::name)
            .unwrap_or("other")
    }
}

fn parse_payload<T: DeserializeOwned>(raw: &RawEvent) -> std::result::Result<T, SwarmError> {
    serde_json::from_value(raw.payload.clone()).map_err(|e| SwarmError::InvalidPayload {
        code: raw.code,
        reason: e.to_string(),
    })
}

fn to_value<T: Serialize>(code: u8, payload: &T) -> std::result::Result<Value, SwarmError> {
    serde_json::to_value(payload).map_err(|e| SwarmError::InvalidPayload {
        code,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(code: EventCode, payload: Value) -> RawEvent {
        RawEvent {
            code: code.as_u8(),
            payload,
            sender: Some(1),
            reliable: true,
            receivers: ReceiverGroup::All,
        }
    }

    #[test]
    fn test_take_seat_wire_shape() {
        let event = BotEvent::TakeSeat(SeatChange::claim(3));
        assert_eq!(
            event.payload().unwrap(),
            json!({"oldSeatNumber": -1, "newSeatNumber": 3})
        );
        assert_eq!(event.code(), 4);
    }

    #[test]
    fn test_actor_update_wire_shape() {
        let event = BotEvent::UpdateCurrentActor(ActorUpdate::authing(7));
        assert_eq!(
            event.payload().unwrap(),
            json!({"actorNr": 7, "action": "isAuthing", "updateOthers": false})
        );
    }

    #[test]
    fn test_actor_nr_accepts_numeric_strings() {
        let decoded = BotEvent::decode(&raw(
            EventCode::UpdateCurrentActor,
            json!({"actorNr": " 12 ", "action": "isAuthing"}),
        ))
        .unwrap();

        match decoded {
            BotEvent::UpdateCurrentActor(update) => {
                assert_eq!(update.actor_nr, 12);
                assert_eq!(update.update_others, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_turn_update_without_action_defaults_to_empty() {
        let decoded = BotEvent::decode(&raw(EventCode::UpdateCurrentTurn, json!({}))).unwrap();
        assert_eq!(
            decoded,
            BotEvent::UpdateCurrentTurn(TurnUpdate {
                action: String::new()
            })
        );
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let result = BotEvent::decode(&raw(EventCode::PlayerMove, json!({"0": "left"})));
        assert!(matches!(
            result,
            Err(SwarmError::InvalidPayload { code: 1, .. })
        ));

        let result = BotEvent::decode(&raw(EventCode::UpdateCurrentActor, json!({"actorNr": "x"})));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_code_decodes_to_other() {
        let event = RawEvent {
            code: 40,
            payload: Value::Null,
            sender: None,
            reliable: true,
            receivers: ReceiverGroup::All,
        };
        assert_eq!(BotEvent::decode(&event).unwrap(), BotEvent::Other(40));
    }

    #[test]
    fn test_player_info_uses_byte_keys() {
        let event = BotEvent::PlayerInfo(PlayerInfoPayload {
            name: "Player_0".to_string(),
            color: 0x00ff00,
        });
        assert_eq!(
            event.payload().unwrap(),
            json!({"2": "Player_0", "3": 0x00ff00})
        );
    }

    #[test]
    fn test_outgoing_into_raw_stamps_sender() {
        let outgoing = BotEvent::VotingEnded
            .to_outgoing(true, ReceiverGroup::All)
            .unwrap();
        let delivered = outgoing.into_raw(Some(5));
        assert_eq!(delivered.sender, Some(5));
        assert_eq!(delivered.code, EventCode::VotingEnded.as_u8());
        assert_eq!(delivered.payload, json!(""));
    }
}
