//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the animal
//! matchmaking service, including readiness and liveness probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Fraction of the connection limit above which the service reports degraded
const CONNECTION_PRESSURE_RATIO: f64 = 0.9;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional message when not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players currently waiting
    pub players_waiting: usize,
    /// Rooms created since service start
    pub rooms_created: u64,
    /// Players matched since service start
    pub players_matched: u64,
    /// Open sockets across both transports
    pub active_connections: usize,
    /// Service uptime in seconds
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        for check in [
            Self::check_engine(&app_state),
            Self::check_connections(&app_state),
        ] {
            if check.status == HealthStatus::Unhealthy {
                overall_status = HealthStatus::Unhealthy;
            } else if check.status == HealthStatus::Degraded
                && overall_status == HealthStatus::Healthy
            {
                overall_status = HealthStatus::Degraded;
            }
            checks.push(check);
        }

        let stats = Self::gather_service_stats(&app_state);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can accept more players
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_connections(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The engine has no failure modes; reading its stats proves its locks are usable
    fn check_engine(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let stats = app_state.engine().get_stats();
        debug!(
            "Engine check - waiting: {}, rooms: {}",
            stats.players_waiting, stats.rooms_registered
        );

        ComponentCheck {
            name: "matchmaking_engine".to_string(),
            status: HealthStatus::Healthy,
            message: None,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_connections(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let active = app_state.hub().connection_count();
        let limit = app_state.config().matchmaking.max_connections;

        let (status, message) = if active >= limit {
            (
                HealthStatus::Unhealthy,
                Some(format!("Connection limit reached ({}/{})", active, limit)),
            )
        } else if active as f64 >= limit as f64 * CONNECTION_PRESSURE_RATIO {
            (
                HealthStatus::Degraded,
                Some(format!("Near connection limit ({}/{})", active, limit)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        ComponentCheck {
            name: "connections".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let stats = app_state.engine().get_stats();

        ServiceStats {
            players_waiting: stats.players_waiting,
            rooms_created: stats.rooms_created,
            players_matched: stats.players_matched,
            active_connections: app_state.hub().connection_count(),
            uptime_seconds: app_state.uptime().as_secs(),
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
