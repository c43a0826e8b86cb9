//! HTTP and WebSocket endpoints of the public listener
//!
//! `/gamehub` carries JSON frames and `/ws` carries colon-delimited text
//! frames. Each socket holds a connection slot, gets a connection id, an
//! outbound channel registered with the hub, and a writer task that encodes
//! events for its transport.

use crate::error::MatchmakingError;
use crate::metrics::{MetricsCollector, TransportKind};
use crate::transport::dispatcher::Dispatcher;
use crate::transport::hub::ConnectionHub;
use crate::transport::protocol::{encode_hub_event, ServerEvent};
use crate::transport::text::encode_text_event;
use crate::utils::{current_timestamp, generate_connection_id};
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::{Sink, SinkExt, StreamExt};
use serde_json::json;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

/// How long a closing socket may take to flush already queued events
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Limits applied to every socket
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_connections: usize,
    pub max_message_bytes: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_message_bytes: 4096,
        }
    }
}

/// Shared state of the public listener
#[derive(Clone)]
pub struct TransportState {
    pub dispatcher: Arc<Dispatcher>,
    pub hub: Arc<ConnectionHub>,
    pub metrics_collector: Arc<MetricsCollector>,
    pub limits: ConnectionLimits,
    pub allowed_origins: Arc<Vec<String>>,
    connection_slots: Arc<Semaphore>,
}

impl TransportState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        hub: Arc<ConnectionHub>,
        metrics_collector: Arc<MetricsCollector>,
        limits: ConnectionLimits,
        allowed_origins: Vec<String>,
    ) -> Self {
        let permits = limits.max_connections.min(Semaphore::MAX_PERMITS);
        Self {
            dispatcher,
            hub,
            metrics_collector,
            limits,
            allowed_origins: Arc::new(allowed_origins),
            connection_slots: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Reserve a connection slot, or `None` when every slot is taken
    ///
    /// The slot is released when the permit is dropped.
    pub fn reserve_slot(&self) -> Option<OwnedSemaphorePermit> {
        self.connection_slots.clone().try_acquire_owned().ok()
    }

    /// Number of slots currently free
    pub fn available_slots(&self) -> usize {
        self.connection_slots.available_permits()
    }
}

/// Build the router for the public listener
pub fn create_router(state: TransportState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/test", get(test_handler))
        .route("/status", get(status_handler))
        .route("/echo", post(echo_handler))
        .route("/gamehub", get(gamehub_handler))
        .route("/ws", get(text_socket_handler))
        .layer(middleware::from_fn_with_state(state.clone(), cors_middleware))
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "Animal Matchmaking Server is running!"
}

async fn test_handler() -> &'static str {
    "Test endpoint is working!"
}

async fn status_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "timestamp": current_timestamp(),
    }))
}

async fn echo_handler(body: String) -> String {
    format!("Server received: {}", body)
}

async fn gamehub_handler(
    State(state): State<TransportState>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, TransportKind::Hub)
}

async fn text_socket_handler(
    State(state): State<TransportState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => upgrade(state, ws, TransportKind::Text),
        Err(rejection) => {
            debug!("Rejected non-WebSocket request on /ws: {}", rejection);
            (StatusCode::BAD_REQUEST, "WebSocket connection expected").into_response()
        }
    }
}

fn upgrade(state: TransportState, ws: WebSocketUpgrade, transport: TransportKind) -> Response {
    let Some(slot) = state.reserve_slot() else {
        warn!(
            "Connection limit of {} reached, refusing {} socket",
            state.limits.max_connections,
            transport.as_str()
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.max_message_size(state.limits.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, transport, slot))
}

/// Drive one socket until it closes
async fn handle_socket(
    socket: WebSocket,
    state: TransportState,
    transport: TransportKind,
    _slot: OwnedSemaphorePermit,
) {
    let connection_id = generate_connection_id();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();

    state.hub.register(connection_id.clone(), event_tx);
    state
        .metrics_collector
        .record_connection_opened(transport);
    info!(
        "Connection {} opened on {} transport",
        connection_id,
        transport.as_str()
    );

    let writer = tokio::spawn(write_events(ws_sender, event_rx, transport));

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if text.len() > state.limits.max_message_bytes {
                    warn!(
                        "Frame of {} bytes from {} exceeds limit",
                        text.len(),
                        connection_id
                    );
                    continue;
                }
                state
                    .dispatcher
                    .handle_frame(&connection_id, transport, text.as_str());
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                debug!("Ignoring binary frame from {}", connection_id);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Socket error on {}: {}", connection_id, e);
                break;
            }
        }
    }

    state.dispatcher.handle_disconnect(&connection_id);
    // The hub held the only sender, so the writer stops once the queue drains
    state.hub.unregister(&connection_id);

    let abort = writer.abort_handle();
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await {
        Ok(Ok(Ok(written))) => debug!("Wrote {} events to {}", written, connection_id),
        Ok(Ok(Err(e))) => debug!("Writer for {} stopped early: {}", connection_id, e),
        Ok(Err(e)) => error!("Writer task for {} failed: {}", connection_id, e),
        Err(_) => {
            warn!("Writer for {} did not drain in time", connection_id);
            abort.abort();
        }
    }

    state
        .metrics_collector
        .record_connection_closed(transport);
    info!("Connection {} closed", connection_id);
}

/// Encode queued events onto a socket sink until the queue closes
///
/// Returns how many frames were written. Events that cannot be encoded are
/// logged and skipped; a failed write ends the loop.
async fn write_events<S>(
    mut sink: S,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    transport: TransportKind,
) -> Result<usize, MatchmakingError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut written = 0;
    while let Some(event) = events.recv().await {
        let frame = match transport {
            TransportKind::Hub => match encode_hub_event(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Dropping {} event: {}", event.name(), e);
                    continue;
                }
            },
            TransportKind::Text => encode_text_event(&event),
        };

        sink.send(Message::Text(frame.into()))
            .await
            .map_err(|e| MatchmakingError::TransportError {
                message: format!("Failed to write {} event: {}", event.name(), e),
            })?;
        written += 1;
    }

    Ok(written)
}

/// Add CORS headers for allowed origins and answer preflight requests
async fn cors_middleware(
    State(state): State<TransportState>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|origin| state.allowed_origins.iter().any(|allowed| allowed == origin))
        .and_then(|origin| HeaderValue::from_str(origin).ok());

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type, authorization, x-requested-with"),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }

    response
}
