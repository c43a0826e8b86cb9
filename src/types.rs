//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a live connection, assigned by the transport layer
pub type ConnectionId = String;

/// Unique identifier for game rooms
pub type RoomId = Uuid;

/// Playable animal a player selects before queueing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Animal {
    Cat,
    Dog,
    Rabbit,
    Fox,
    Bear,
}

impl Animal {
    /// All animals in wire index order
    pub const ALL: [Animal; 5] = [
        Animal::Cat,
        Animal::Dog,
        Animal::Rabbit,
        Animal::Fox,
        Animal::Bear,
    ];

    /// Look up an animal by its wire index
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Wire index of this animal
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Animal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Animal::Cat => write!(f, "Cat"),
            Animal::Dog => write!(f, "Dog"),
            Animal::Rabbit => write!(f, "Rabbit"),
            Animal::Fox => write!(f, "Fox"),
            Animal::Bear => write!(f, "Bear"),
        }
    }
}

/// Game mode of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Infinite,
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Infinite => write!(f, "Infinite"),
        }
    }
}

/// Lifecycle state of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Waiting,
    Matching,
    Playing,
    Finished,
}

/// A player waiting for a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: ConnectionId,
    pub nickname: String,
    pub selected_animal: Animal,
    pub level: u32,
    pub experience: u64,
}

impl Player {
    /// Create a fresh level 1 player for a connection
    pub fn new(id: impl Into<ConnectionId>, nickname: impl Into<String>, animal: Animal) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            selected_animal: animal,
            level: 1,
            experience: 0,
        }
    }
}

/// A waiting set entry handed out by a pairing pass
pub type PairedEntry = (ConnectionId, Player);

/// A two-player room produced by a successful pairing
///
/// `players` is a fixed pair of owned snapshots, so a room can never hold
/// any other number of players and later queue changes never reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRoom {
    pub room_id: RoomId,
    pub players: [Player; 2],
    pub mode: GameMode,
    pub state: GameState,
    pub random_seed: u32,
    pub created_at: DateTime<Utc>,
}

impl GameRoom {
    /// Nicknames of both players, in pairing order
    pub fn nicknames(&self) -> [&str; 2] {
        [
            self.players[0].nickname.as_str(),
            self.players[1].nickname.as_str(),
        ]
    }
}
