//! Colon-delimited text frames used by the raw socket channel
//!
//! Inbound: `JOIN:<nickname>:<animal index>`, `LEAVE`, `COUNT`. Frames that
//! match none of these are ignored. Outbound frames are
//! `<KIND>:<fields...>` with the kind in upper case.

use crate::error::{MatchmakingError, Result};
use crate::transport::protocol::{ClientRequest, ServerEvent};
use crate::types::Animal;

const JOIN_PREFIX: &str = "JOIN:";

/// Decode a text frame
///
/// Returns `Ok(None)` for frames that are not requests at all, which the
/// channel silently drops.
pub fn decode_text_frame(frame: &str) -> Result<Option<ClientRequest>> {
    let frame = frame.trim_end_matches(['\r', '\n']);

    if frame.starts_with(JOIN_PREFIX) {
        let parts: Vec<&str> = frame.split(':').collect();
        if parts.len() < 3 {
            return Err(MatchmakingError::InvalidRequest {
                reason: "JOIN requires a nickname and an animal index".to_string(),
            }
            .into());
        }

        let index: i64 = parts[2]
            .trim()
            .parse()
            .map_err(|_| MatchmakingError::UnknownAnimal {
                value: parts[2].to_string(),
            })?;
        let animal = Animal::from_index(index).ok_or_else(|| MatchmakingError::UnknownAnimal {
            value: parts[2].to_string(),
        })?;

        return Ok(Some(ClientRequest::Join {
            nickname: parts[1].to_string(),
            animal,
        }));
    }

    match frame {
        "LEAVE" => Ok(Some(ClientRequest::Leave)),
        "COUNT" => Ok(Some(ClientRequest::GetWaitingCount)),
        _ => Ok(None),
    }
}

/// Encode an event as a text frame
pub fn encode_text_event(event: &ServerEvent) -> String {
    match event {
        ServerEvent::MatchmakingJoined { message, .. } => format!("JOINED:{}", message),
        ServerEvent::MatchmakingLeft { message } => format!("LEFT:{}", message),
        ServerEvent::MatchmakingError { message } => format!("ERROR:{}", message),
        ServerEvent::WaitingCount { count } => format!("COUNT:{}", count),
        ServerEvent::GameMatched(payload) => {
            format!("MATCHED:{}:{}", payload.room_id, payload.random_seed)
        }
        ServerEvent::ReceiveMessage { sender, message } => {
            format!("MESSAGE:{}:{}", sender, message)
        }
    }
}
