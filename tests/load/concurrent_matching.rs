//! Concurrency tests for the matchmaking engine
//!
//! These drive the engine from many OS threads at once and check that no
//! player is ever paired twice or lost.

use crate::fixtures::{create_test_dispatcher, create_test_engine, create_test_player};
use animal_matchmaking::matchmaking::{MatchOutcome, SeedSource};
use animal_matchmaking::metrics::TransportKind;
use animal_matchmaking::transport::{ClientRequest, ServerEvent};
use animal_matchmaking::types::Animal;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_passes_create_exactly_one_room() {
    for _ in 0..50 {
        let engine = create_test_engine();
        engine.join_matchmaking(create_test_player("a", Animal::Cat), "a");
        engine.join_matchmaking(create_test_player("b", Animal::Dog), "b");

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine.try_match_players().is_matched()
                })
            })
            .collect();

        let matched = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|matched| *matched)
            .count();

        assert_eq!(matched, 1);
        assert_eq!(engine.room_count(), 1);
        assert_eq!(engine.get_waiting_count(), 0);
    }
}

#[test]
fn test_concurrent_joins_are_all_paired_once() {
    let engine = create_test_engine();
    let threads = 16;
    let per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut rooms = Vec::new();
                for i in 0..per_thread {
                    let id = format!("t{}-{}", t, i);
                    let outcome =
                        engine.join_matchmaking(create_test_player(&id, Animal::ALL[i % 5]), &id);
                    assert!(outcome.accepted);
                    assert!(outcome.waiting_count >= 1, "{} joined with count 0", id);
                    if let MatchOutcome::Matched { room, .. } = engine.try_match_players() {
                        rooms.push(room);
                    }
                }
                rooms
            })
        })
        .collect();

    let rooms: Vec<_> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    let total = threads * per_thread;
    assert_eq!(rooms.len(), total / 2);
    assert_eq!(engine.get_waiting_count(), 0);

    let mut seen = HashSet::new();
    for room in &rooms {
        for player in &room.players {
            assert!(seen.insert(player.id.clone()), "{} paired twice", player.id);
        }
    }
    assert_eq!(seen.len(), total);

    let seeds: HashSet<_> = rooms.iter().map(|room| room.random_seed).collect();
    assert_eq!(seeds.len(), rooms.len());
}

#[test]
fn test_concurrent_joins_acknowledge_before_match() {
    let threads = 8;

    for round in 0..300 {
        let (dispatcher, notifier, engine) = create_test_dispatcher();
        let dispatcher = Arc::new(dispatcher);
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    dispatcher.handle_request(
                        &format!("c{}", i),
                        TransportKind::Hub,
                        ClientRequest::Join {
                            nickname: format!("player-{}", i),
                            animal: Animal::ALL[i % 5],
                        },
                    );
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..threads {
            let id = format!("c{}", i);
            let events = notifier.events_for(&id);

            match events.first() {
                Some(ServerEvent::MatchmakingJoined { waiting_count, .. }) => {
                    assert!(*waiting_count >= 1, "round {}: {} acked with count 0", round, id);
                }
                other => panic!("round {}: first event for {} was {:?}", round, id, other),
            }
            assert_eq!(notifier.matches_for(&id).len(), 1, "round {}: {}", round, id);
        }

        assert_eq!(engine.get_waiting_count(), 0);
        assert_eq!(engine.room_count(), threads / 2);
    }
}

#[test]
fn test_leave_racing_pairing_never_loses_or_duplicates() {
    for _ in 0..50 {
        let engine = create_test_engine();
        engine.join_matchmaking(create_test_player("a", Animal::Cat), "a");
        engine.join_matchmaking(create_test_player("b", Animal::Dog), "b");
        engine.join_matchmaking(create_test_player("c", Animal::Fox), "c");

        let barrier = Arc::new(Barrier::new(2));
        let leaver = {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.leave_matchmaking("a")
            })
        };
        let matcher = {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.try_match_players()
            })
        };

        let left = leaver.join().unwrap();
        let outcome = matcher.join().unwrap();

        let MatchOutcome::Matched { paired, .. } = outcome else {
            panic!("Two players were always available");
        };
        let paired_ids: Vec<_> = paired.iter().map(|(id, _)| id.as_str()).collect();

        if left {
            assert_eq!(paired_ids, ["b", "c"]);
            assert_eq!(engine.get_waiting_count(), 0);
        } else {
            assert_eq!(paired_ids, ["a", "b"]);
            assert_eq!(engine.get_waiting_players()[0].id, "c");
        }
    }
}

#[test]
fn test_concurrent_duplicate_joins_accept_one() {
    let engine = create_test_engine();
    let threads = 12;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine
                    .join_matchmaking(create_test_player("same", Animal::ALL[i % 5]), "same")
                    .accepted
            })
        })
        .collect();

    let accepted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|accepted| *accepted)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(engine.get_waiting_count(), 1);
    assert_eq!(engine.get_stats().duplicate_joins, (threads - 1) as u64);
}

#[test]
fn test_seeds_unique_across_threads() {
    let seeds = Arc::new(SeedSource::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let seeds = seeds.clone();
            thread::spawn(move || (0..1250).map(|_| seeds.next_seed()).collect::<Vec<_>>())
        })
        .collect();

    let all: Vec<u32> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    let unique: HashSet<_> = all.iter().copied().collect();

    assert_eq!(all.len(), 10_000);
    assert_eq!(unique.len(), 10_000);
    assert_eq!(seeds.issued_count(), 10_000);
}

#[derive(Debug, Clone)]
enum Op {
    Join(usize),
    Leave(usize),
    Match,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize).prop_map(Op::Join),
        (0..8usize).prop_map(Op::Leave),
        Just(Op::Match),
    ]
}

proptest! {
    #[test]
    fn prop_engine_matches_queue_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let engine = create_test_engine();
        let mut model: Vec<String> = Vec::new();
        let mut ever_paired: HashMap<String, usize> = HashMap::new();
        let mut rooms = 0;

        for op in ops {
            match op {
                Op::Join(n) => {
                    let id = format!("c{}", n);
                    let outcome = engine.join_matchmaking(create_test_player(&id, Animal::Cat), &id);
                    let expected = !model.contains(&id);
                    prop_assert_eq!(outcome.accepted, expected);
                    if expected {
                        model.push(id);
                    }
                    prop_assert_eq!(outcome.waiting_count, model.len());
                }
                Op::Leave(n) => {
                    let id = format!("c{}", n);
                    let position = model.iter().position(|waiting| *waiting == id);
                    prop_assert_eq!(engine.leave_matchmaking(&id), position.is_some());
                    if let Some(position) = position {
                        model.remove(position);
                    }
                }
                Op::Match => match engine.try_match_players() {
                    MatchOutcome::Matched { room, paired } => {
                        prop_assert!(model.len() >= 2);
                        let expected: Vec<String> = model.drain(..2).collect();
                        prop_assert_eq!(&paired[0].0, &expected[0]);
                        prop_assert_eq!(&paired[1].0, &expected[1]);
                        prop_assert_ne!(&room.players[0].id, &room.players[1].id);
                        for id in expected {
                            *ever_paired.entry(id).or_default() += 1;
                        }
                        rooms += 1;
                    }
                    MatchOutcome::NotMatched => prop_assert!(model.len() < 2),
                },
            }

            let waiting: Vec<String> = engine
                .get_waiting_players()
                .into_iter()
                .map(|player| player.id)
                .collect();
            prop_assert_eq!(&waiting, &model);
        }

        prop_assert_eq!(engine.room_count(), rooms);
        prop_assert_eq!(ever_paired.values().sum::<usize>(), rooms * 2);
    }
}
