//! Typed view of the `gameState` room property
//!
//! Seat and role arrays are 1-based; index 0 is padding. An entry is empty
//! when it is JSON `null`.

use crate::error::{Result, SwarmError};
use crate::types::{ActorId, PropertyMap, Room, GAME_STATE_KEY};
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(default)]
    pub seats: Vec<Value>,

    #[serde(rename = "role", default)]
    pub roles: Vec<Value>,

    /// Actors that already held the turn token, as id strings
    #[serde(
        rename = "shunwei_one_been",
        default,
        deserialize_with = "deserialize_id_strings"
    )]
    pub already_acted: Vec<String>,
}

impl GameState {
    /// Fresh state for a room with nobody seated
    pub fn empty(max_players: u8) -> Self {
        Self {
            seats: vec![Value::Null; max_players as usize + 1],
            roles: vec![Value::Null; max_players as usize],
            already_acted: Vec::new(),
        }
    }

    /// Read the game state out of a room snapshot
    pub fn from_room(room: &Room) -> Result<Self> {
        Self::from_properties(&room.name, &room.properties)
    }

    pub fn from_properties(room_name: &str, properties: &PropertyMap) -> Result<Self> {
        let value = properties
            .get(GAME_STATE_KEY)
            .ok_or_else(|| SwarmError::MissingGameState {
                room: room_name.to_string(),
            })?;

        serde_json::from_value(value.clone())
            .with_context(|| format!("Malformed gameState in room {}", room_name))
    }

    /// Whether a 1-based seat slot is unoccupied; slots past the array are free
    pub fn is_seat_free(&self, slot: usize) -> bool {
        self.seats.get(slot).map_or(true, Value::is_null)
    }

    pub fn is_role_free(&self, slot: usize) -> bool {
        self.roles.get(slot).map_or(true, Value::is_null)
    }

    pub fn has_acted(&self, actor_id: ActorId) -> bool {
        let id = actor_id.to_string();
        self.already_acted.iter().any(|acted| *acted == id)
    }

    /// Mark a seat as taken by `occupant`, growing the array if needed
    pub fn occupy_seat(&mut self, slot: usize, occupant: Value) {
        if self.seats.len() <= slot {
            self.seats.resize(slot + 1, Value::Null);
        }
        self.seats[slot] = occupant;
    }

    pub fn occupy_role(&mut self, slot: usize, occupant: Value) {
        if self.roles.len() <= slot {
            self.roles.resize(slot + 1, Value::Null);
        }
        self.roles[slot] = occupant;
    }

    /// Property map carrying this state, ready for `set_room_properties`
    pub fn to_properties(&self) -> Result<PropertyMap> {
        let mut properties = PropertyMap::new();
        properties.insert(
            GAME_STATE_KEY.to_string(),
            serde_json::to_value(self).context("Failed to serialize gameState")?,
        );
        Ok(properties)
    }
}

/// Hosts write actor numbers into the acted list as either numbers or strings
fn deserialize_id_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<Value> = Vec::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn room_with(state: Value) -> Room {
        let mut properties = PropertyMap::new();
        properties.insert(GAME_STATE_KEY.to_string(), state);
        Room {
            name: "alpha".to_string(),
            max_players: 4,
            is_open: true,
            players: BTreeMap::new(),
            properties,
        }
    }

    #[test]
    fn test_parse_host_layout() {
        let room = room_with(json!({
            "seats": [null, "a", "b"],
            "role": [null, null, "x", null],
            "shunwei_one_been": ["2", 5]
        }));

        let state = GameState::from_room(&room).unwrap();
        assert!(!state.is_seat_free(1));
        assert!(!state.is_seat_free(2));
        assert!(state.is_seat_free(3));
        assert!(state.is_seat_free(4));
        assert!(state.is_role_free(1));
        assert!(!state.is_role_free(2));
        assert_eq!(state.already_acted, vec!["2".to_string(), "5".to_string()]);
        assert!(state.has_acted(5));
        assert!(!state.has_acted(3));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let state = GameState::from_room(&room_with(json!({}))).unwrap();
        assert!(state.seats.is_empty());
        assert!(state.roles.is_empty());
        assert!(state.already_acted.is_empty());
    }

    #[test]
    fn test_missing_property_is_reported() {
        let mut room = room_with(Value::Null);
        room.properties.clear();

        let err = GameState::from_room(&room).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SwarmError>(),
            Some(SwarmError::MissingGameState { .. })
        ));
    }

    #[test]
    fn test_malformed_property_is_an_error() {
        let room = room_with(json!({"seats": "nope"}));
        assert!(GameState::from_room(&room).is_err());
    }

    #[test]
    fn test_empty_layout_and_occupy() {
        let mut state = GameState::empty(4);
        assert_eq!(state.seats.len(), 5);
        assert_eq!(state.roles.len(), 4);

        state.occupy_seat(2, json!(7));
        state.occupy_role(6, json!(7));
        assert!(!state.is_seat_free(2));
        assert_eq!(state.roles.len(), 7);

        let properties = state.to_properties().unwrap();
        let back = GameState::from_properties("alpha", &properties).unwrap();
        assert_eq!(back, state);
    }
}
