//! Requests and events exchanged with clients
//!
//! Both transports decode into [`ClientRequest`] and send [`ServerEvent`]s.
//! This module also carries the JSON encoding used on the hub channel: every
//! message is an object tagged by `"type"` with a snake_case name.

use crate::error::{MatchmakingError, Result};
use crate::types::{Animal, ConnectionId, GameMode, GameRoom, RoomId};
use serde::{Deserialize, Deserializer, Serialize};

/// Acknowledgement sent to the first player in an empty queue
pub const JOINED_WAITING_MESSAGE: &str = "Joined matchmaking. Waiting for an opponent...";
/// Acknowledgement sent when others are already waiting
pub const JOINED_MESSAGE: &str = "Joined matchmaking.";
pub const LEFT_MESSAGE: &str = "Left matchmaking.";
pub const ALREADY_WAITING_MESSAGE: &str = "Already waiting for a match";
pub const NOT_WAITING_MESSAGE: &str = "Not waiting for a match";
/// Sender name used when the server echoes a message back to its caller
pub const SERVER_SENDER: &str = "Server";

/// A decoded client request, independent of the transport it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Queue for a match
    #[serde(rename = "join_matchmaking")]
    Join {
        nickname: String,
        #[serde(rename = "selected_animal", deserialize_with = "deserialize_animal")]
        animal: Animal,
    },
    /// Leave the queue
    #[serde(rename = "leave_matchmaking")]
    Leave,
    /// Ask for the number of waiting players
    GetWaitingCount,
    /// Broadcast a chat message to every connection
    SendMessage { message: String },
    /// Echo a message back to the caller
    SendToCaller { message: String },
}

impl ClientRequest {
    /// Short name used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            ClientRequest::Join { .. } => "join",
            ClientRequest::Leave => "leave",
            ClientRequest::GetWaitingCount => "get_waiting_count",
            ClientRequest::SendMessage { .. } => "send_message",
            ClientRequest::SendToCaller { .. } => "send_to_caller",
        }
    }
}

/// Animals arrive either by name or by wire index
#[derive(Deserialize)]
#[serde(untagged)]
enum AnimalRepr {
    Index(i64),
    Name(String),
}

fn deserialize_animal<'de, D>(deserializer: D) -> std::result::Result<Animal, D::Error>
where
    D: Deserializer<'de>,
{
    let animal = match AnimalRepr::deserialize(deserializer)? {
        AnimalRepr::Index(index) => Animal::from_index(index),
        AnimalRepr::Name(name) => Animal::ALL
            .into_iter()
            .find(|animal| animal.to_string().eq_ignore_ascii_case(name.trim())),
    };

    animal.ok_or_else(|| serde::de::Error::custom("unknown animal"))
}

/// Player entry of a matched notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPlayer {
    pub id: ConnectionId,
    pub nickname: String,
    pub selected_animal: Animal,
}

/// Data pushed to both players of a new room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMatchedPayload {
    pub room_id: RoomId,
    pub players: Vec<MatchedPlayer>,
    pub random_seed: u32,
    pub game_mode: GameMode,
}

impl From<&GameRoom> for GameMatchedPayload {
    fn from(room: &GameRoom) -> Self {
        Self {
            room_id: room.room_id,
            players: room
                .players
                .iter()
                .map(|player| MatchedPlayer {
                    id: player.id.clone(),
                    nickname: player.nickname.clone(),
                    selected_animal: player.selected_animal,
                })
                .collect(),
            random_seed: room.random_seed,
            game_mode: room.mode,
        }
    }
}

/// Outbound events, sent to a single connection or broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    MatchmakingJoined { message: String, waiting_count: usize },
    MatchmakingLeft { message: String },
    MatchmakingError { message: String },
    WaitingCount { count: usize },
    GameMatched(GameMatchedPayload),
    ReceiveMessage { sender: String, message: String },
}

impl ServerEvent {
    /// Event name used in logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::MatchmakingJoined { .. } => "matchmaking_joined",
            ServerEvent::MatchmakingLeft { .. } => "matchmaking_left",
            ServerEvent::MatchmakingError { .. } => "matchmaking_error",
            ServerEvent::WaitingCount { .. } => "waiting_count",
            ServerEvent::GameMatched(_) => "game_matched",
            ServerEvent::ReceiveMessage { .. } => "receive_message",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::MatchmakingError {
            message: message.into(),
        }
    }
}

/// Decode a JSON hub frame into a request
pub fn decode_hub_request(frame: &str) -> Result<ClientRequest> {
    serde_json::from_str(frame).map_err(|e| {
        MatchmakingError::InvalidRequest {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Encode an event as a JSON hub frame
pub fn encode_hub_event(event: &ServerEvent) -> Result<String> {
    serde_json::to_string(event).map_err(|e| {
        MatchmakingError::InternalError {
            message: format!("Failed to serialize {} event: {}", event.name(), e),
        }
        .into()
    })
}
