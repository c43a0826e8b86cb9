//! Registry of created game rooms
//!
//! Rooms live here for the rest of the process; there is no expiry.

use crate::types::{GameRoom, RoomId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Process-lifetime store of rooms keyed by room id
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, GameRoom>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room; returns false if the id was already taken
    pub fn insert(&self, room: GameRoom) -> bool {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        if rooms.contains_key(&room.room_id) {
            return false;
        }
        rooms.insert(room.room_id, room);
        true
    }

    /// Look up a room by id
    pub fn get(&self, room_id: &RoomId) -> Option<GameRoom> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rooms, in no particular order
    pub fn all(&self) -> Vec<GameRoom> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
