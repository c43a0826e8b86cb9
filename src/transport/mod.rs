//! Client-facing transports for the matchmaking service
//!
//! This module decodes client frames from the JSON hub channel and the text
//! channel, routes them to the engine, and pushes results back through the
//! connection hub.

pub mod dispatcher;
pub mod hub;
pub mod protocol;
pub mod text;
pub mod ws;

// Re-export commonly used types
pub use dispatcher::Dispatcher;
pub use hub::{ConnectionHub, EventSender, Notifier};
pub use protocol::{ClientRequest, GameMatchedPayload, MatchedPlayer, ServerEvent};
pub use ws::{create_router, ConnectionLimits, TransportState};
