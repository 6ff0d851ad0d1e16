//! Turn token ring
//!
//! There is no explicit turn state. Whoever receives "update current actor"
//! naming itself forwards the token to the first active actor that has not
//! acted yet, and the chain ends once nobody is left.

use crate::protocol::{ActorUpdate, GameState};
use crate::types::{ActorId, Room};

/// Next holder of the turn token, in ascending actor id order
pub fn next_actor(room: &Room, local_actor: ActorId, already_acted: &[String]) -> Option<ActorId> {
    room.players
        .values()
        .filter(|actor| actor.is_active && !actor.is_local && actor.id != local_actor)
        .map(|actor| actor.id)
        .find(|id| {
            let id = id.to_string();
            !already_acted.iter().any(|acted| *acted == id)
        })
}

/// Decide whether and where to forward a received token
pub fn forward_token(
    update: &ActorUpdate,
    local_actor: ActorId,
    room: &Room,
    state: &GameState,
) -> Option<ActorUpdate> {
    if update.actor_nr != local_actor {
        return None;
    }
    next_actor(room, local_actor, &state.already_acted).map(ActorUpdate::authing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ACTION_AUTHING;
    use crate::types::{Actor, PropertyMap};
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashSet};

    fn room(ids: &[ActorId], local: ActorId) -> Room {
        let players: BTreeMap<ActorId, Actor> = ids
            .iter()
            .map(|id| {
                (
                    *id,
                    Actor {
                        id: *id,
                        name: format!("Player_{}", id),
                        is_local: *id == local,
                        is_active: true,
                        properties: PropertyMap::new(),
                    },
                )
            })
            .collect();
        Room {
            name: "alpha".to_string(),
            max_players: 8,
            is_open: true,
            players,
            properties: PropertyMap::new(),
        }
    }

    fn acted(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_forwards_to_lowest_eligible_actor() {
        let room = room(&[1, 2, 3, 4], 2);
        assert_eq!(next_actor(&room, 2, &acted(&["2"])), Some(1));
        assert_eq!(next_actor(&room, 2, &acted(&["1", "2"])), Some(3));
    }

    #[test]
    fn test_chain_ends_when_everyone_acted() {
        let room = room(&[1, 2, 3], 2);
        assert_eq!(next_actor(&room, 2, &acted(&["1", "3"])), None);
        assert_eq!(next_actor(&self::room(&[2], 2), 2, &[]), None);
    }

    #[test]
    fn test_inactive_actors_are_skipped() {
        let mut room = room(&[1, 2, 3], 2);
        if let Some(actor) = room.players.get_mut(&1) {
            actor.is_active = false;
        }
        assert_eq!(next_actor(&room, 2, &[]), Some(3));
    }

    #[test]
    fn test_forward_only_when_addressed() {
        let room = room(&[1, 2, 3], 2);
        let state = GameState {
            already_acted: acted(&["2"]),
            ..GameState::default()
        };

        let to_other = ActorUpdate::authing(3);
        assert_eq!(forward_token(&to_other, 2, &room, &state), None);

        let to_me = ActorUpdate::authing(2);
        let forwarded = forward_token(&to_me, 2, &room, &state).unwrap();
        assert_eq!(forwarded.actor_nr, 1);
        assert_eq!(forwarded.action.as_deref(), Some(ACTION_AUTHING));
        assert_eq!(forwarded.update_others, Some(false));
    }

    proptest! {
        // Marking every holder as acted, the chain visits each actor at most
        // once and always terminates
        #[test]
        fn prop_chain_visits_each_actor_once(count in 1i32..12, start in 0i32..12) {
            let ids: Vec<ActorId> = (1..=count).collect();
            let mut holder = (start % count) + 1;
            let mut already_acted: Vec<String> = Vec::new();
            let mut visited = HashSet::new();

            for _ in 0..=count {
                already_acted.push(holder.to_string());
                prop_assert!(visited.insert(holder));
                match next_actor(&room(&ids, holder), holder, &already_acted) {
                    Some(next) => holder = next,
                    None => break,
                }
            }
            prop_assert_eq!(visited.len(), count as usize);
        }
    }
}
