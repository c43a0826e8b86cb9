//! Matchmaking engine that pairs waiting players into rooms
//!
//! This module provides the core `MatchmakingEngine`, which owns the waiting
//! set, the room registry and the seed source. Every operation is
//! synchronous and never performs I/O; callers notify clients only after an
//! operation has returned, using the data it handed back.
//!
//! Pairing is strict arrival order, two at a time. A pass either removes
//! exactly two players and creates their room, or removes nothing.

use crate::matchmaking::rooms::RoomRegistry;
use crate::matchmaking::seed::SeedSource;
use crate::matchmaking::waiting::WaitingSet;
use crate::metrics::MetricsCollector;
use crate::types::{GameMode, GameRoom, GameState, PairedEntry, Player, RoomId};
use crate::utils::{current_timestamp, generate_room_id};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Result of a join request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Whether the player was queued
    pub accepted: bool,
    /// Waiting count observed right after the request
    pub waiting_count: usize,
}

/// Result of a pairing pass
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Fewer than two players were waiting; nothing changed
    NotMatched,
    /// Two players were taken from the queue and placed in a new room
    Matched {
        room: GameRoom,
        paired: [PairedEntry; 2],
    },
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }

    pub fn room(&self) -> Option<&GameRoom> {
        match self {
            MatchOutcome::Matched { room, .. } => Some(room),
            MatchOutcome::NotMatched => None,
        }
    }
}

/// Statistics about engine operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Total players accepted into the queue
    pub players_joined: u64,
    /// Join requests rejected because the connection was already waiting
    pub duplicate_joins: u64,
    /// Players removed by an explicit leave or a disconnect
    pub players_left: u64,
    /// Total players placed in rooms
    pub players_matched: u64,
    /// Total rooms created
    pub rooms_created: u64,
    /// Current number of players waiting
    pub players_waiting: usize,
    /// Current number of rooms in the registry
    pub rooms_registered: usize,
}

/// The matchmaking engine
#[derive(Clone)]
pub struct MatchmakingEngine {
    /// Players waiting for a match
    waiting: Arc<WaitingSet>,
    /// Rooms created so far
    rooms: Arc<RoomRegistry>,
    /// Room seed generator
    seeds: Arc<SeedSource>,
    /// Engine statistics
    stats: Arc<RwLock<EngineStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchmakingEngine {
    /// Create a new engine with its own metrics collector
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(MetricsCollector::default()))
    }

    /// Create a new engine with metrics collector
    pub fn with_metrics(metrics_collector: Arc<MetricsCollector>) -> Self {
        Self::with_seed_source(Arc::new(SeedSource::new()), metrics_collector)
    }

    /// Create with a custom seed source and metrics
    pub fn with_seed_source(
        seeds: Arc<SeedSource>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            waiting: Arc::new(WaitingSet::new()),
            rooms: Arc::new(RoomRegistry::new()),
            seeds,
            stats: Arc::new(RwLock::new(EngineStats::default())),
            metrics_collector,
        }
    }

    fn update_stats(&self, update: impl FnOnce(&mut EngineStats)) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut stats);
    }

    /// Queue a player under a connection id
    ///
    /// A connection that is already waiting is rejected and its existing
    /// entry is left untouched. Joining never triggers pairing; call
    /// [`try_match_players`](Self::try_match_players) afterwards.
    pub fn join_matchmaking(&self, player: Player, connection_id: &str) -> JoinOutcome {
        let timer = self.metrics_collector.start_timer();
        let nickname = player.nickname.clone();
        let animal = player.selected_animal;

        let inserted = self.waiting.insert_if_absent(connection_id, player);
        let accepted = inserted.is_some();
        let waiting_count = inserted.unwrap_or_else(|| self.waiting.len());

        if accepted {
            self.update_stats(|stats| stats.players_joined += 1);
            info!(
                "Player '{}' ({}) joined matchmaking - connection: {}, waiting: {}",
                nickname, animal, connection_id, waiting_count
            );
        } else {
            self.update_stats(|stats| stats.duplicate_joins += 1);
            warn!(
                "Player '{}' is already waiting - connection: {}",
                nickname, connection_id
            );
        }

        self.metrics_collector.record_join(accepted, waiting_count);
        self.metrics_collector
            .record_engine_operation("join", timer.stop());

        JoinOutcome {
            accepted,
            waiting_count,
        }
    }

    /// Remove a waiting connection; returns whether anything was removed
    pub fn leave_matchmaking(&self, connection_id: &str) -> bool {
        let timer = self.metrics_collector.start_timer();
        let removed = self.waiting.remove(connection_id);
        let waiting_count = self.waiting.len();

        if removed {
            self.update_stats(|stats| stats.players_left += 1);
            info!(
                "Connection {} left matchmaking - waiting: {}",
                connection_id, waiting_count
            );
        } else {
            debug!("Leave ignored, connection {} is not waiting", connection_id);
        }

        self.metrics_collector.record_leave(removed, waiting_count);
        self.metrics_collector
            .record_engine_operation("leave", timer.stop());

        removed
    }

    /// Run one pairing pass
    ///
    /// The size check and the removal of both players are a single waiting
    /// set operation, so concurrent passes never share a player and a lone
    /// player is never dropped from the queue.
    pub fn try_match_players(&self) -> MatchOutcome {
        let timer = self.metrics_collector.start_timer();

        let Some(paired) = self.waiting.take_pair() else {
            self.metrics_collector.record_pairing_pass(false);
            self.metrics_collector
                .record_engine_operation("pair", timer.stop());
            return MatchOutcome::NotMatched;
        };

        let room = self.create_game_room(&paired);
        let waiting_count = self.waiting.len();
        let room_count = self.rooms.len();

        self.update_stats(|stats| {
            stats.rooms_created += 1;
            stats.players_matched += 2;
        });

        let [first, second] = room.nicknames();
        info!(
            "Game room {} created - players: {}, {}, seed: {}, waiting: {}",
            room.room_id, first, second, room.random_seed, waiting_count
        );

        self.metrics_collector.record_pairing_pass(true);
        self.metrics_collector
            .record_room_created(waiting_count, room_count);
        self.metrics_collector
            .record_engine_operation("pair", timer.stop());

        MatchOutcome::Matched { room, paired }
    }

    /// Build a room from two paired entries and register it
    fn create_game_room(&self, paired: &[PairedEntry; 2]) -> GameRoom {
        let mut room = GameRoom {
            room_id: generate_room_id(),
            players: [paired[0].1.clone(), paired[1].1.clone()],
            mode: GameMode::default(),
            state: GameState::Matching,
            random_seed: self.seeds.next_seed(),
            created_at: current_timestamp(),
        };

        while !self.rooms.insert(room.clone()) {
            warn!("Room id {} already registered, drawing a new one", room.room_id);
            room.room_id = generate_room_id();
        }

        room
    }

    /// Number of players currently waiting
    pub fn get_waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Waiting players in arrival order
    pub fn get_waiting_players(&self) -> Vec<Player> {
        self.waiting.snapshot()
    }

    /// Whether a connection is currently waiting
    pub fn is_waiting(&self, connection_id: &str) -> bool {
        self.waiting.contains(connection_id)
    }

    /// Look up a created room
    pub fn get_room(&self, room_id: &RoomId) -> Option<GameRoom> {
        self.rooms.get(room_id)
    }

    /// Number of rooms created so far
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get current engine statistics
    pub fn get_stats(&self) -> EngineStats {
        let mut stats = self
            .stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        stats.players_waiting = self.waiting.len();
        stats.rooms_registered = self.rooms.len();
        stats
    }
}

impl Default for MatchmakingEngine {
    fn default() -> Self {
        Self::new()
    }
}
