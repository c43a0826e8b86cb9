//! Engine lifecycle tests: queue order, room registration, stats

use crate::fixtures::{create_seeded_engine, create_test_engine, create_test_player};
use animal_matchmaking::matchmaking::MatchOutcome;
use animal_matchmaking::types::{Animal, GameMode, GameState};
use std::collections::HashSet;

#[test]
fn test_players_are_paired_in_arrival_order() {
    let engine = create_test_engine();

    for i in 0..6 {
        let id = format!("p{}", i);
        let outcome = engine.join_matchmaking(create_test_player(&id, Animal::ALL[i % 5]), &id);
        assert!(outcome.accepted);
    }

    let mut pairs = Vec::new();
    while let MatchOutcome::Matched { paired, .. } = engine.try_match_players() {
        pairs.push([paired[0].0.clone(), paired[1].0.clone()]);
    }

    assert_eq!(
        pairs,
        vec![
            ["p0".to_string(), "p1".to_string()],
            ["p2".to_string(), "p3".to_string()],
            ["p4".to_string(), "p5".to_string()],
        ]
    );
    assert_eq!(engine.get_waiting_count(), 0);
    assert_eq!(engine.room_count(), 3);
}

#[test]
fn test_leaving_player_loses_their_place() {
    let engine = create_test_engine();

    engine.join_matchmaking(create_test_player("a", Animal::Cat), "a");
    engine.join_matchmaking(create_test_player("b", Animal::Dog), "b");
    engine.join_matchmaking(create_test_player("c", Animal::Fox), "c");

    assert!(engine.leave_matchmaking("a"));
    engine.join_matchmaking(create_test_player("a", Animal::Cat), "a");

    let outcome = engine.try_match_players();
    let room = outcome.room().unwrap();
    assert_eq!(room.nicknames(), ["b-nick", "c-nick"]);
    assert_eq!(engine.get_waiting_players()[0].id, "a");
}

#[test]
fn test_registered_room_matches_outcome() {
    let engine = create_test_engine();
    engine.join_matchmaking(create_test_player("a", Animal::Rabbit), "a");
    engine.join_matchmaking(create_test_player("b", Animal::Bear), "b");

    let MatchOutcome::Matched { room, paired } = engine.try_match_players() else {
        panic!("Expected a match");
    };

    assert_eq!(room.mode, GameMode::Infinite);
    assert_eq!(room.state, GameState::Matching);
    assert_eq!(room.players[0], paired[0].1);
    assert_eq!(room.players[1], paired[1].1);
    assert_eq!(engine.get_room(&room.room_id), Some(room.clone()));
    assert!(room.random_seed <= i32::MAX as u32);
}

#[test]
fn test_not_matched_leaves_state_untouched() {
    let engine = create_test_engine();
    assert_eq!(engine.try_match_players(), MatchOutcome::NotMatched);

    engine.join_matchmaking(create_test_player("solo", Animal::Cat), "solo");
    assert_eq!(engine.try_match_players(), MatchOutcome::NotMatched);
    assert!(engine.is_waiting("solo"));
    assert_eq!(engine.room_count(), 0);
}

#[test]
fn test_seeded_engines_are_reproducible() {
    let run = |seed| {
        let engine = create_seeded_engine(seed);
        (0..20)
            .map(|i| {
                let a = format!("a{}", i);
                let b = format!("b{}", i);
                engine.join_matchmaking(create_test_player(&a, Animal::Cat), &a);
                engine.join_matchmaking(create_test_player(&b, Animal::Dog), &b);
                engine.try_match_players().room().unwrap().random_seed
            })
            .collect::<Vec<_>>()
    };

    let first = run(7);
    assert_eq!(first, run(7));
    assert_eq!(first.iter().collect::<HashSet<_>>().len(), first.len());
}

#[test]
fn test_ten_thousand_rooms_have_distinct_ids_and_seeds() {
    let engine = create_test_engine();
    let mut room_ids = HashSet::new();
    let mut seeds = Vec::with_capacity(10_000);

    for i in 0..10_000 {
        let a = format!("a{}", i);
        let b = format!("b{}", i);
        engine.join_matchmaking(create_test_player(&a, Animal::Cat), &a);
        engine.join_matchmaking(create_test_player(&b, Animal::Dog), &b);

        let outcome = engine.try_match_players();
        let room = outcome.room().unwrap();
        assert!(room_ids.insert(room.room_id));
        seeds.push(room.random_seed);
    }

    assert_eq!(seeds.iter().collect::<HashSet<_>>().len(), 10_000);
    assert!(!seeds.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(engine.room_count(), 10_000);
}

#[test]
fn test_stats_track_lifecycle() {
    let engine = create_test_engine();

    engine.join_matchmaking(create_test_player("a", Animal::Cat), "a");
    engine.join_matchmaking(create_test_player("a", Animal::Cat), "a");
    engine.join_matchmaking(create_test_player("b", Animal::Dog), "b");
    engine.join_matchmaking(create_test_player("c", Animal::Fox), "c");
    engine.leave_matchmaking("c");
    engine.leave_matchmaking("c");
    engine.try_match_players();

    let stats = engine.get_stats();
    assert_eq!(stats.players_joined, 3);
    assert_eq!(stats.duplicate_joins, 1);
    assert_eq!(stats.players_left, 1);
    assert_eq!(stats.players_matched, 2);
    assert_eq!(stats.rooms_created, 1);
    assert_eq!(stats.players_waiting, 0);
    assert_eq!(stats.rooms_registered, 1);
}
