//! Main application configuration
//!
//! This module defines the primary configuration structures for the animal
//! matchmaking service, including environment variable loading, TOML file
//! loading and validation.

use crate::error::MatchmakingError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Origins allowed to call the public listener from a browser
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:8080",
    "https://localhost:8080",
    "http://localhost:3000",
];

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Public listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind
    pub host: String,
    /// Port for HTTP and WebSocket endpoints
    pub port: u16,
    /// Origins that receive CORS headers
    pub cors_allowed_origins: Vec<String>,
}

/// Matchmaking and connection limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Maximum concurrent sockets across both transports
    pub max_connections: usize,
    /// Largest inbound frame accepted, in bytes
    pub max_message_bytes: usize,
    /// Interval for refreshing gauges from engine statistics
    pub stats_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "animal-matchmaking".to_string(),
            log_level: "info".to_string(),
            health_port: 8081,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_message_bytes: 4096,
            stats_interval_seconds: 30,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("Invalid {} value: {}", name, value)))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| invalid(format!("Invalid TOML configuration: {}", e)))
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = parse_var("HEALTH_PORT", &port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Public listener settings
        if let Ok(host) = env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            self.server.port = parse_var("SERVER_PORT", &port)?;
        }
        if let Ok(origins) = env::var("CORS_ALLOWED_ORIGINS") {
            self.server.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }

        // Matchmaking settings
        if let Ok(max) = env::var("MAX_CONNECTIONS") {
            self.matchmaking.max_connections = parse_var("MAX_CONNECTIONS", &max)?;
        }
        if let Ok(bytes) = env::var("MAX_MESSAGE_BYTES") {
            self.matchmaking.max_message_bytes = parse_var("MAX_MESSAGE_BYTES", &bytes)?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get stats refresh interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.stats_interval_seconds)
    }

    /// Address of the public listener
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    MatchmakingError::ConfigurationError {
        message: message.into(),
    }
    .into()
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(invalid(format!("Invalid log level: {}", config.service.log_level))),
    }

    if config.service.name.trim().is_empty() {
        return Err(invalid("Service name cannot be empty"));
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(invalid("Health port cannot be 0"));
    }
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }
    if config.server.port == config.service.health_port {
        return Err(invalid(format!(
            "Server port and health port must differ (both {})",
            config.server.port
        )));
    }
    if config.server.host.trim().is_empty() {
        return Err(invalid("Server host cannot be empty"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(invalid("Shutdown timeout must be greater than 0"));
    }
    if config.matchmaking.stats_interval_seconds == 0 {
        return Err(invalid("Stats interval must be greater than 0"));
    }

    // Validate limits
    if config.matchmaking.max_connections == 0 {
        return Err(invalid("Max connections must be greater than 0"));
    }
    if config.matchmaking.max_message_bytes == 0 {
        return Err(invalid("Max message size must be greater than 0"));
    }

    Ok(())
}
