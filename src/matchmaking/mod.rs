//! Matchmaking core for the animal matchmaking service
//!
//! This module holds the waiting set, the room registry, the seed source and
//! the engine that ties them together. Nothing here knows about transports.

pub mod engine;
pub mod rooms;
pub mod seed;
pub mod waiting;

// Re-export commonly used types
pub use engine::{EngineStats, JoinOutcome, MatchOutcome, MatchmakingEngine};
pub use rooms::RoomRegistry;
pub use seed::{SeedSource, MAX_SEED};
pub use waiting::WaitingSet;
