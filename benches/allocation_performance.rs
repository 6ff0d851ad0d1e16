//! Performance benchmarks for seat, role and token decisions

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use room_swarm::bot::allocation::{free_seat_pool, role_for, seat_for, select_role_slot};
use room_swarm::bot::rotation::next_actor;
use room_swarm::bot::RoomSharedState;
use room_swarm::protocol::GameState;
use room_swarm::types::{Actor, PropertyMap, Room};
use serde_json::json;
use std::collections::BTreeMap;

/// Half-occupied state for a room of `max_players`
fn half_full_state(max_players: u8) -> GameState {
    let mut state = GameState::empty(max_players);
    for slot in (1..=max_players as usize).step_by(2) {
        state.occupy_seat(slot, json!(slot));
        state.occupy_role(slot.min(max_players as usize - 1), json!(slot));
        state.already_acted.push(slot.to_string());
    }
    state
}

fn room_with(players: i32, local: i32) -> Room {
    let players: BTreeMap<_, _> = (1..=players)
        .map(|id| {
            (
                id,
                Actor {
                    id,
                    name: format!("Player_{}", id),
                    is_local: id == local,
                    is_active: true,
                    properties: PropertyMap::new(),
                },
            )
        })
        .collect();
    Room {
        name: "bench".to_string(),
        max_players: 64,
        is_open: true,
        players,
        properties: PropertyMap::new(),
    }
}

fn bench_seat_allocation(c: &mut Criterion) {
    let state = half_full_state(64);

    c.bench_function("free_seat_pool_64", |b| {
        b.iter(|| black_box(free_seat_pool(black_box(&state), 64)))
    });

    let pool = free_seat_pool(&state, 64);
    c.bench_function("seat_for_batch_32", |b| {
        b.iter(|| {
            for sequence_id in 0..32 {
                black_box(seat_for(&pool, sequence_id, 64));
            }
        })
    });

    c.bench_function("shared_pool_publish_batch_32", |b| {
        b.iter(|| {
            let shared = RoomSharedState::new("bench", 32);
            for sequence_id in 0..32 {
                let _ = black_box(
                    shared.seat_pool_or_publish(sequence_id, || Ok(free_seat_pool(&state, 64))),
                );
            }
        })
    });
}

fn bench_role_selection(c: &mut Criterion) {
    let state = half_full_state(64);

    c.bench_function("select_role_slot_64", |b| {
        b.iter(|| {
            let slot = select_role_slot(black_box(&state));
            black_box(role_for(slot, 7, 64))
        })
    });
}

fn bench_token_rotation(c: &mut Criterion) {
    let room = room_with(64, 2);
    let state = half_full_state(64);

    c.bench_function("next_actor_64", |b| {
        b.iter(|| black_box(next_actor(black_box(&room), 2, &state.already_acted)))
    });
}

criterion_group!(
    benches,
    bench_seat_allocation,
    bench_role_selection,
    bench_token_rotation
);
criterion_main!(benches);
