//! Error types for the matchmaking service
//!
//! The matchmaking engine itself never fails: duplicate joins, redundant
//! leaves and short queues are reported through return values. These errors
//! cover the layers around it (request decoding, transports, configuration).

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Unknown animal: {value}")]
    UnknownAnimal { value: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
