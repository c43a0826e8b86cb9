//! Animal Matchmaking - real-time two-player matchmaking over WebSocket
//!
//! This crate pairs players into two-player rooms in strict arrival order.
//! The [`matchmaking`] engine is synchronous and performs no I/O; the
//! [`transport`] layer carries a JSON hub channel and a text frame channel
//! over WebSocket and notifies players once the engine has returned.

pub mod config;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod service;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matchmaking::{JoinOutcome, MatchOutcome, MatchmakingEngine};
pub use transport::{ClientRequest, ServerEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
