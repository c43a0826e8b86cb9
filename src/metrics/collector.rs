//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the matchmaking engine and
//! its WebSocket transports using Prometheus metrics.

use crate::matchmaking::engine::EngineStats;
use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transport a connection arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// JSON hub channel
    Hub,
    /// Raw text-framed socket channel
    Text,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Hub => "hub",
            TransportKind::Text => "text",
        }
    }
}

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Matchmaking engine metrics
    matchmaking_metrics: MatchmakingMetrics,

    /// Connection and transport metrics
    connection_metrics: ConnectionMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Matchmaking engine metrics
#[derive(Clone)]
pub struct MatchmakingMetrics {
    /// Join requests by result (accepted, duplicate)
    pub join_requests_total: IntCounterVec,

    /// Leave requests by result (removed, absent)
    pub leave_requests_total: IntCounterVec,

    /// Pairing passes by result (matched, insufficient)
    pub pairing_passes_total: IntCounterVec,

    /// Total rooms created
    pub rooms_created_total: IntCounter,

    /// Players currently waiting
    pub players_waiting: IntGauge,

    /// Rooms currently registered
    pub rooms_registered: IntGauge,
}

/// Connection and transport metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Open connections by transport
    pub connections_active: IntGaugeVec,

    /// Total accepted connections by transport
    pub connections_total: IntCounterVec,

    /// Inbound messages by transport and status (ok, invalid)
    pub messages_received_total: IntCounterVec,

    /// Outbound notifications by event and status (delivered, dropped)
    pub notifications_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Engine operation durations
    pub engine_operation_duration: HistogramVec,

    /// Request handling durations by transport
    pub request_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let matchmaking_metrics = MatchmakingMetrics::new(&registry)?;
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            matchmaking_metrics,
            connection_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get matchmaking metrics
    pub fn matchmaking(&self) -> &MatchmakingMetrics {
        &self.matchmaking_metrics
    }

    /// Get connection metrics
    pub fn connections(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh the current-state gauges from engine stats
    pub fn update_from_engine_stats(&self, stats: &EngineStats) {
        self.matchmaking_metrics
            .players_waiting
            .set(stats.players_waiting as i64);
        self.matchmaking_metrics
            .rooms_registered
            .set(stats.rooms_registered as i64);
    }

    /// Record a join request
    pub fn record_join(&self, accepted: bool, waiting_count: usize) {
        let result = if accepted { "accepted" } else { "duplicate" };
        self.matchmaking_metrics
            .join_requests_total
            .with_label_values(&[result])
            .inc();
        self.matchmaking_metrics
            .players_waiting
            .set(waiting_count as i64);
    }

    /// Record a leave request
    pub fn record_leave(&self, removed: bool, waiting_count: usize) {
        let result = if removed { "removed" } else { "absent" };
        self.matchmaking_metrics
            .leave_requests_total
            .with_label_values(&[result])
            .inc();
        self.matchmaking_metrics
            .players_waiting
            .set(waiting_count as i64);
    }

    /// Record a pairing pass
    pub fn record_pairing_pass(&self, matched: bool) {
        let result = if matched { "matched" } else { "insufficient" };
        self.matchmaking_metrics
            .pairing_passes_total
            .with_label_values(&[result])
            .inc();
    }

    /// Record a room being created
    pub fn record_room_created(&self, waiting_count: usize, room_count: usize) {
        self.matchmaking_metrics.rooms_created_total.inc();
        self.matchmaking_metrics
            .players_waiting
            .set(waiting_count as i64);
        self.matchmaking_metrics
            .rooms_registered
            .set(room_count as i64);
    }

    /// Record a connection being accepted
    pub fn record_connection_opened(&self, transport: TransportKind) {
        self.connection_metrics
            .connections_total
            .with_label_values(&[transport.as_str()])
            .inc();
        self.connection_metrics
            .connections_active
            .with_label_values(&[transport.as_str()])
            .inc();
    }

    /// Record a connection going away
    pub fn record_connection_closed(&self, transport: TransportKind) {
        self.connection_metrics
            .connections_active
            .with_label_values(&[transport.as_str()])
            .dec();
    }

    /// Record an inbound message and how long it took to handle
    pub fn record_message(&self, transport: TransportKind, valid: bool, duration: Duration) {
        let status = if valid { "ok" } else { "invalid" };
        self.connection_metrics
            .messages_received_total
            .with_label_values(&[transport.as_str(), status])
            .inc();
        self.performance_metrics
            .request_duration
            .with_label_values(&[transport.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Record an outbound notification
    pub fn record_notification(&self, event: &str, delivered: bool) {
        let status = if delivered { "delivered" } else { "dropped" };
        self.connection_metrics
            .notifications_total
            .with_label_values(&[event, status])
            .inc();
    }

    /// Record engine operation duration
    pub fn record_engine_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .engine_operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Update service uptime
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new(
            "animal_matchmaking_uptime_seconds",
            "Service uptime in seconds",
        )?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "animal_matchmaking_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new(
                "animal_matchmaking_component_health",
                "Component health status",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl MatchmakingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let join_requests_total = IntCounterVec::new(
            Opts::new(
                "animal_matchmaking_join_requests_total",
                "Matchmaking join requests",
            ),
            &["result"],
        )?;
        registry.register(Box::new(join_requests_total.clone()))?;

        let leave_requests_total = IntCounterVec::new(
            Opts::new(
                "animal_matchmaking_leave_requests_total",
                "Matchmaking leave requests",
            ),
            &["result"],
        )?;
        registry.register(Box::new(leave_requests_total.clone()))?;

        let pairing_passes_total = IntCounterVec::new(
            Opts::new(
                "animal_matchmaking_pairing_passes_total",
                "Pairing passes run",
            ),
            &["result"],
        )?;
        registry.register(Box::new(pairing_passes_total.clone()))?;

        let rooms_created_total = IntCounter::new(
            "animal_matchmaking_rooms_created_total",
            "Total game rooms created",
        )?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let players_waiting = IntGauge::new(
            "animal_matchmaking_players_waiting",
            "Players currently waiting for a match",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let rooms_registered = IntGauge::new(
            "animal_matchmaking_rooms_registered",
            "Rooms held in the room registry",
        )?;
        registry.register(Box::new(rooms_registered.clone()))?;

        Ok(Self {
            join_requests_total,
            leave_requests_total,
            pairing_passes_total,
            rooms_created_total,
            players_waiting,
            rooms_registered,
        })
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let connections_active = IntGaugeVec::new(
            Opts::new(
                "animal_matchmaking_connections_active",
                "Open WebSocket connections",
            ),
            &["transport"],
        )?;
        registry.register(Box::new(connections_active.clone()))?;

        let connections_total = IntCounterVec::new(
            Opts::new(
                "animal_matchmaking_connections_total",
                "Accepted WebSocket connections",
            ),
            &["transport"],
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let messages_received_total = IntCounterVec::new(
            Opts::new(
                "animal_matchmaking_messages_received_total",
                "Inbound client messages",
            ),
            &["transport", "status"],
        )?;
        registry.register(Box::new(messages_received_total.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "animal_matchmaking_notifications_total",
                "Outbound notifications",
            ),
            &["event", "status"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            connections_active,
            connections_total,
            messages_received_total,
            notifications_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let engine_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "animal_matchmaking_engine_operation_duration_seconds",
                "Matchmaking engine operation duration",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["operation"],
        )?;
        registry.register(Box::new(engine_operation_duration.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "animal_matchmaking_request_duration_seconds",
                "Client request handling time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["transport"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            engine_operation_duration,
            request_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
