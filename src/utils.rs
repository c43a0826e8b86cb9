//! Utility functions for the matchmaking service

use crate::types::{ConnectionId, RoomId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique room ID
pub fn generate_room_id() -> RoomId {
    Uuid::new_v4()
}

/// Generate a new connection ID for an accepted socket
pub fn generate_connection_id() -> ConnectionId {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
