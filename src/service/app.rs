//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the matchmaking
//! engine to its transports, serves the public listener and the health
//! server, and runs background maintenance tasks.

use crate::config::AppConfig;
use crate::matchmaking::MatchmakingEngine;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::transport::{
    create_router, ConnectionHub, ConnectionLimits, Dispatcher, TransportState,
};
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking engine
    engine: Arc<MatchmakingEngine>,

    /// Live connections
    hub: Arc<ConnectionHub>,

    /// Request routing between transports and the engine
    dispatcher: Arc<Dispatcher>,

    /// Metrics collector shared by every component
    metrics_collector: Arc<MetricsCollector>,

    /// State shared by the public endpoints, including the connection slots
    transport: TransportState,

    /// Metrics service, created on start
    metrics_service: StdMutex<Option<Arc<MetricsService>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Shutdown signal for the public listener
    server_shutdown: broadcast::Sender<()>,

    /// Bound address of the public listener
    local_addr: StdMutex<Option<SocketAddr>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing animal matchmaking service");
        info!(
            "Configuration: service={}, listen={}, health_port={}",
            config.service.name,
            config.server_addr(),
            config.service.health_port
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let engine = Arc::new(MatchmakingEngine::with_metrics(metrics_collector.clone()));
        let hub = Arc::new(ConnectionHub::new());
        let dispatcher = Arc::new(Dispatcher::new(
            engine.clone(),
            hub.clone(),
            metrics_collector.clone(),
        ));
        let transport = TransportState::new(
            dispatcher.clone(),
            hub.clone(),
            metrics_collector.clone(),
            ConnectionLimits {
                max_connections: config.matchmaking.max_connections,
                max_message_bytes: config.matchmaking.max_message_bytes,
            },
            config.server.cors_allowed_origins.clone(),
        );
        let (server_shutdown, _) = broadcast::channel(1);

        Ok(Self {
            config,
            engine,
            hub,
            dispatcher,
            metrics_collector,
            transport,
            metrics_service: StdMutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            server_shutdown,
            local_addr: StdMutex::new(None),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the listeners and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting animal matchmaking service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.start_public_listener().await?;
        self.start_background_tasks().await;

        info!("✅ Animal matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of animal matchmaking service");

        *self.is_running.write().await = false;

        if self.server_shutdown.send(()).is_err() {
            debug!("Public listener was not running");
        }

        let metrics_service = self
            .metrics_service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(metrics_service) = metrics_service {
            info!("Stopping metrics service...");
            if let Err(e) = metrics_service.stop().await {
                warn!("Failed to stop metrics service: {}", e);
            } else {
                info!("✅ Metrics service stopped");
            }
        }

        let stopped = self.stop_background_tasks().await;

        let final_stats = self.engine.get_stats();
        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Animal matchmaking service shutdown completed");

        stopped
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the matchmaking engine
    pub fn engine(&self) -> Arc<MatchmakingEngine> {
        self.engine.clone()
    }

    /// Get the connection hub
    pub fn hub(&self) -> Arc<ConnectionHub> {
        self.hub.clone()
    }

    /// Get the request dispatcher
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Get the metrics collector
    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Time since the state was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Address the public listener bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// State shared by the public endpoints
    pub fn transport_state(&self) -> TransportState {
        self.transport.clone()
    }

    /// Router for the public listener
    pub fn router(&self) -> Router {
        create_router(self.transport_state())
    }

    /// Start metrics and health endpoints
    async fn start_metrics_service(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.health_port;
        info!("Starting metrics and health endpoints on port {}", port);

        let health_config = HealthServerConfig {
            port,
            host: self.config.server.host.clone(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_app_state(self.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(
            self.metrics_collector.clone(),
            health_server,
        ));

        let task_service = metrics_service.clone();
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = task_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        *self
            .metrics_service
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(metrics_service);
        self.background_tasks.lock().await.push(metrics_handle);

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Bind and serve the public HTTP and WebSocket listener
    async fn start_public_listener(&self) -> Result<(), ServiceError> {
        let addr = self.config.server_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServiceError::Bind {
                addr: addr.clone(),
                message: e.to_string(),
            })?;

        let bound = listener.local_addr().map_err(|e| ServiceError::Bind {
            addr: addr.clone(),
            message: e.to_string(),
        })?;
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(bound);

        let app = self.router();
        let mut shutdown_rx = self.server_shutdown.subscribe();

        let server_handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("Public listener shutdown signal received");
                })
                .await;

            match result {
                Ok(()) => info!("Public listener stopped"),
                Err(e) => error!("Public listener failed: {}", e),
            }
        });
        self.background_tasks.lock().await.push(server_handle);

        info!("✅ Listening for players on http://{}", bound);
        info!("   Hub endpoint: ws://{}/gamehub", bound);
        info!("   Text endpoint: ws://{}/ws", bound);
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        info!("Starting background maintenance tasks...");

        let stats_interval = self.config.stats_interval();
        info!(
            "Starting engine metrics update task ({}s interval)...",
            stats_interval.as_secs()
        );
        let metrics_task = {
            let engine = self.engine.clone();
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(stats_interval);
                info!("Metrics update task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let stats = engine.get_stats();
                    debug!(
                        "Updating metrics - waiting: {}, rooms: {}",
                        stats.players_waiting, stats.rooms_registered
                    );
                    metrics_collector.update_from_engine_stats(&stats);
                }

                info!("Metrics update task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    metrics_collector.update_uptime(started_at.elapsed());
                    metrics_collector.update_health_status(2);
                    metrics_collector.update_component_health("matchmaking_engine", true);
                    metrics_collector.update_component_health("public_listener", true);
                    metrics_collector.update_component_health("metrics", true);
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(metrics_task);
        tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
    }

    /// Stop all background tasks
    ///
    /// Reports the first task that panicked before it was stopped.
    async fn stop_background_tasks(&self) -> Result<(), ServiceError> {
        let tasks: Vec<_> = self.background_tasks.lock().await.drain(..).collect();
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return Ok(());
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.iter().enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        let mut failure = None;
        for (i, task) in tasks.into_iter().enumerate() {
            match task.await {
                Err(e) if e.is_panic() => {
                    error!("Background task {}/{} panicked: {}", i + 1, task_count, e);
                    failure.get_or_insert(ServiceError::BackgroundTask {
                        message: format!("task {} panicked: {}", i + 1, e),
                    });
                }
                _ => {}
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                info!("✅ All {} background tasks stopped", task_count);
                Ok(())
            }
        }
    }
}
